use crate::session::{Game, SteamSession};
use futures_util::future::{select, Either};
use rand::Rng;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScheduleError {
    #[error("no games selected to idle")]
    EmptySelection,
    #[error("maximum {0} time must be at least one millisecond")]
    ZeroDuration(&'static str),
}

/// Limits for the randomized cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Play time is picked from `[0, max_play)`
    pub max_play: Duration,
    /// Rest time is picked from `[0, max_rest)`
    pub max_rest: Duration,
    /// Stop after this many cycles, run forever if `None`
    pub cycles: Option<usize>,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            max_play: 12 * HOUR,
            max_rest: 24 * HOUR,
            cycles: None,
        }
    }
}

/// One play/rest round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<'a> {
    pub game: &'a Game,
    pub play: Duration,
    pub rest: Duration,
}

/// How [`run_until_interrupted`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The cycle limit was reached or a stop was requested
    Finished { cycles: usize },
    /// The interrupt fired, playing has been stopped
    Interrupted,
}

/// Alternates between playing a random game and resting
pub struct Scheduler<'a, S, R> {
    session: &'a S,
    games: &'a [Game],
    schedule: Schedule,
    rng: R,
    stop: CancellationToken,
}

impl<'a, S: SteamSession, R: Rng> Scheduler<'a, S, R> {
    pub fn new(
        session: &'a S,
        games: &'a [Game],
        schedule: Schedule,
        rng: R,
        stop: CancellationToken,
    ) -> Result<Self, ScheduleError> {
        if games.is_empty() {
            return Err(ScheduleError::EmptySelection);
        }
        if schedule.max_play.as_millis() == 0 {
            return Err(ScheduleError::ZeroDuration("play"));
        }
        if schedule.max_rest.as_millis() == 0 {
            return Err(ScheduleError::ZeroDuration("rest"));
        }
        Ok(Scheduler {
            session,
            games,
            schedule,
            rng,
            stop,
        })
    }

    /// Token that ends [`run`](Self::run) before the next cycle starts
    ///
    /// Holders of a clone can end idling without dropping the cycle in progress.
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn next_cycle(&mut self) -> Cycle<'a> {
        let game = &self.games[self.rng.gen_range(0..self.games.len())];
        let play = random_duration(&mut self.rng, self.schedule.max_play);
        let rest = random_duration(&mut self.rng, self.schedule.max_rest);
        Cycle { game, play, rest }
    }

    /// Run cycles until the limit is reached or a stop is requested
    ///
    /// Returns the number of completed cycles. A stop request doesn't interrupt the cycle in
    /// progress.
    pub async fn run(&mut self) -> usize {
        let mut completed = 0;
        loop {
            if self.stop.is_cancelled() {
                info!(completed, "stop requested");
                break;
            }
            if self.schedule.cycles.is_some_and(|limit| completed >= limit) {
                info!(completed, "cycle limit reached");
                break;
            }
            let cycle = self.next_cycle();
            self.run_cycle(&cycle).await;
            completed += 1;
        }
        completed
    }

    async fn run_cycle(&self, cycle: &Cycle<'_>) {
        let app_id = cycle.game.appid;
        if let Err(e) = self.session.set_played_games(&[app_id]).await {
            warn!(error = %e, app_id, "failed to start playing");
        }
        info!(
            game = %cycle.game.name,
            app_id,
            seconds = cycle.play.as_secs_f64(),
            "playing"
        );
        sleep(cycle.play).await;

        if let Err(e) = self.session.set_played_games(&[]).await {
            warn!(error = %e, app_id, "failed to stop playing");
        }
        info!(seconds = cycle.rest.as_secs_f64(), "resting");
        sleep(cycle.rest).await;
    }
}

fn random_duration<R: Rng>(rng: &mut R, max: Duration) -> Duration {
    let max_millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rng.gen_range(0..max_millis))
}

/// Run the scheduler until it finishes or `interrupt` resolves
///
/// On interrupt the cycle in progress is abandoned, playing is stopped and `grace` is given
/// for the stop request to reach steam.
pub async fn run_until_interrupted<S, R, I>(
    scheduler: &mut Scheduler<'_, S, R>,
    interrupt: I,
    grace: Duration,
) -> Outcome
where
    S: SteamSession,
    R: Rng,
    I: Future<Output = ()>,
{
    let session = scheduler.session;
    let stop = scheduler.stop.clone();
    match select(pin!(scheduler.run()), pin!(interrupt)).await {
        Either::Left((cycles, _)) => Outcome::Finished { cycles },
        Either::Right(((), _)) => {
            info!("exiting from all games");
            stop.cancel();
            if let Err(e) = session.set_played_games(&[]).await {
                warn!(error = %e, "failed to stop playing");
            }
            sleep(grace).await;
            debug!("grace period over");
            Outcome::Interrupted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingSession {
        calls: Mutex<Vec<(Instant, Vec<u32>)>>,
        notify_on_play: Option<Arc<Notify>>,
        cancel_on_stop: Option<CancellationToken>,
    }

    impl RecordingSession {
        fn calls(&self) -> Vec<(Instant, Vec<u32>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SteamSession for RecordingSession {
        async fn owned_games(&self) -> Result<Vec<Game>, SessionError> {
            Ok(Vec::new())
        }

        async fn request_free_license(&self, _app_ids: &[u32]) -> Result<Vec<u32>, SessionError> {
            Ok(Vec::new())
        }

        async fn set_played_games(&self, app_ids: &[u32]) -> Result<(), SessionError> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), app_ids.to_vec()));
            match (&self.notify_on_play, &self.cancel_on_stop) {
                (Some(notify), _) if !app_ids.is_empty() => notify.notify_one(),
                (_, Some(token)) if app_ids.is_empty() => token.cancel(),
                _ => {}
            }
            Ok(())
        }
    }

    fn games() -> Vec<Game> {
        vec![
            Game::new(440, "Team Fortress 2"),
            Game::new(570, "Dota 2"),
            Game::new(730, "Counter-Strike 2"),
        ]
    }

    fn new_scheduler<'a>(
        session: &'a RecordingSession,
        games: &'a [Game],
        schedule: Schedule,
        stop: CancellationToken,
    ) -> Scheduler<'a, RecordingSession, StdRng> {
        Scheduler::new(session, games, schedule, StdRng::seed_from_u64(7), stop).unwrap()
    }

    #[test]
    fn test_duration_bounds() {
        let session = RecordingSession::default();
        let games = games();
        let mut scheduler = new_scheduler(
            &session,
            &games,
            Schedule::default(),
            CancellationToken::new(),
        );

        let samples = 10_000;
        let mut play_total = Duration::ZERO;
        let mut rest_total = Duration::ZERO;
        let mut picks = [0usize; 3];
        for _ in 0..samples {
            let cycle = scheduler.next_cycle();
            assert!(cycle.play < 12 * HOUR);
            assert!(cycle.rest < 24 * HOUR);
            play_total += cycle.play;
            rest_total += cycle.rest;
            let index = games.iter().position(|game| game == cycle.game).unwrap();
            picks[index] += 1;
        }

        let play_mean = play_total.as_secs_f64() / samples as f64;
        let rest_mean = rest_total.as_secs_f64() / samples as f64;
        assert!((play_mean / (6 * HOUR).as_secs_f64() - 1.0).abs() < 0.05);
        assert!((rest_mean / (12 * HOUR).as_secs_f64() - 1.0).abs() < 0.05);
        for count in picks {
            assert!((count as f64 / samples as f64 - 1.0 / 3.0).abs() < 0.05);
        }
    }

    #[test]
    fn test_small_max_duration() {
        let session = RecordingSession::default();
        let games = games();
        let schedule = Schedule {
            max_play: Duration::from_millis(1),
            max_rest: Duration::from_millis(1),
            cycles: None,
        };
        let mut scheduler = new_scheduler(&session, &games, schedule, CancellationToken::new());
        for _ in 0..100 {
            let cycle = scheduler.next_cycle();
            assert_eq!(cycle.play, Duration::ZERO);
            assert_eq!(cycle.rest, Duration::ZERO);
        }
    }

    #[test]
    fn test_empty_selection() {
        let session = RecordingSession::default();
        let result = Scheduler::new(
            &session,
            &[],
            Schedule::default(),
            StdRng::seed_from_u64(1),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(ScheduleError::EmptySelection)));
    }

    #[test]
    fn test_zero_duration() {
        let session = RecordingSession::default();
        let games = games();
        let schedule = Schedule {
            max_play: Duration::from_micros(10),
            ..Schedule::default()
        };
        let result = Scheduler::new(
            &session,
            &games,
            schedule,
            StdRng::seed_from_u64(1),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(ScheduleError::ZeroDuration("play"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_cycle() {
        let session = RecordingSession::default();
        let games = games();
        let schedule = Schedule {
            cycles: Some(1),
            ..Schedule::default()
        };
        let expected = new_scheduler(&session, &games, schedule.clone(), CancellationToken::new())
            .next_cycle();
        let mut scheduler = new_scheduler(&session, &games, schedule, CancellationToken::new());

        let start = Instant::now();
        assert_eq!(scheduler.run().await, 1);

        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec![expected.game.appid]);
        assert_eq!(calls[1].1, Vec::<u32>::new());
        assert_eq!(calls[0].0, start);
        assert_eq!(calls[1].0 - calls[0].0, expected.play);
        assert_eq!(start.elapsed(), expected.play + expected.rest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_checked_between_cycles() {
        let stop = CancellationToken::new();
        let session = RecordingSession {
            cancel_on_stop: Some(stop.clone()),
            ..RecordingSession::default()
        };
        let games = games();
        let expected =
            new_scheduler(&session, &games, Schedule::default(), stop.clone()).next_cycle();
        let mut scheduler = new_scheduler(&session, &games, Schedule::default(), stop);

        let start = Instant::now();
        assert_eq!(scheduler.run().await, 1);
        // the rest period is still waited out
        assert_eq!(start.elapsed(), expected.play + expected.rest);
        assert_eq!(session.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_mid_wait() {
        let notify = Arc::new(Notify::new());
        let session = RecordingSession {
            notify_on_play: Some(notify.clone()),
            ..RecordingSession::default()
        };
        let games = games();
        let mut scheduler =
            new_scheduler(&session, &games, Schedule::default(), CancellationToken::new());

        let start = Instant::now();
        let grace = Duration::from_millis(500);
        let outcome = run_until_interrupted(
            &mut scheduler,
            async move { notify.notified().await },
            grace,
        )
        .await;

        assert_eq!(outcome, Outcome::Interrupted);
        assert!(scheduler.stop_token().is_cancelled());
        assert_eq!(start.elapsed(), grace);
        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[1], (start, Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_without_interrupt() {
        let session = RecordingSession::default();
        let games = games();
        let schedule = Schedule {
            cycles: Some(3),
            ..Schedule::default()
        };
        let mut scheduler = new_scheduler(&session, &games, schedule, CancellationToken::new());
        let outcome = run_until_interrupted(
            &mut scheduler,
            std::future::pending(),
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(outcome, Outcome::Finished { cycles: 3 });
        assert_eq!(session.calls().len(), 6);
    }
}
