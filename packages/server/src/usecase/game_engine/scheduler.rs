//! Per-room delayed actions.
//!
//! Each room has two slots guarded by one lock:
//!
//! - the question slot: the deadline of the open question, either running or
//!   frozen with the time that was left
//! - the advance slot: a one-shot follow-up (first question after the start
//!   delay, auto-next or auto-end after the leaderboard window)
//!
//! Every armed task carries a generation. When its delay elapses it claims
//! its slot, which succeeds only if the slot still holds that generation. A
//! superseded task therefore never runs its action, and a task that has
//! claimed its slot can no longer be aborted by the actions it triggers.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};

use crate::domain::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Question,
    Advance,
}

struct Armed {
    generation: u64,
    handle: JoinHandle<()>,
}

enum QuestionTimer {
    Running { deadline: Instant, armed: Armed },
    Paused { remaining: Duration },
}

impl QuestionTimer {
    fn abort(&self) {
        if let Self::Running { armed, .. } = self {
            armed.handle.abort();
        }
    }
}

#[derive(Default)]
struct RoomTimers {
    question: Option<QuestionTimer>,
    advance: Option<Armed>,
}

impl RoomTimers {
    fn is_empty(&self) -> bool {
        self.question.is_none() && self.advance.is_none()
    }
}

/// Observable state of a room's question slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionTimerState {
    Idle,
    Running { remaining: Duration },
    Paused { remaining: Duration },
}

#[derive(Default)]
pub struct RoomScheduler {
    rooms: Mutex<HashMap<SessionId, RoomTimers>>,
    next_generation: AtomicU64,
}

impl RoomScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the question deadline, cancelling anything pending for the room.
    ///
    /// Returns the deadline.
    pub fn arm_question<F>(
        self: &Arc<Self>,
        room_id: SessionId,
        limit: Duration,
        on_timeout: F,
    ) -> Instant
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + limit;
        let mut rooms = self.lock();
        let timers = rooms.entry(room_id).or_default();
        if let Some(previous) = timers.question.take() {
            previous.abort();
        }
        if let Some(previous) = timers.advance.take() {
            previous.handle.abort();
        }
        let armed = self.spawn(room_id, Slot::Question, deadline, on_timeout);
        timers.question = Some(QuestionTimer::Running { deadline, armed });
        deadline
    }

    /// Replace the room's pending follow-up action
    pub fn schedule_advance<F>(self: &Arc<Self>, room_id: SessionId, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut rooms = self.lock();
        let timers = rooms.entry(room_id).or_default();
        let armed = self.spawn(room_id, Slot::Advance, Instant::now() + delay, action);
        if let Some(previous) = timers.advance.replace(armed) {
            previous.handle.abort();
        }
    }

    /// Drop the question deadline, running or paused. Returns whether one existed.
    pub fn stop_question(&self, room_id: SessionId) -> bool {
        let mut rooms = self.lock();
        let Some(timers) = rooms.get_mut(&room_id) else {
            return false;
        };
        let stopped = timers.question.take().inspect(QuestionTimer::abort).is_some();
        if timers.is_empty() {
            rooms.remove(&room_id);
        }
        stopped
    }

    /// Drop both slots of the room
    pub fn cancel_all(&self, room_id: SessionId) {
        if let Some(timers) = self.lock().remove(&room_id) {
            if let Some(question) = timers.question {
                question.abort();
            }
            if let Some(advance) = timers.advance {
                advance.handle.abort();
            }
        }
    }

    /// Freeze a running question deadline.
    ///
    /// Returns the time left, or `None` if no question timer exists. Pausing
    /// an already paused timer keeps it as is.
    pub fn pause(&self, room_id: SessionId) -> Option<Duration> {
        let mut rooms = self.lock();
        let timers = rooms.get_mut(&room_id)?;
        match timers.question.take()? {
            QuestionTimer::Running { deadline, armed } => {
                armed.handle.abort();
                let remaining = deadline.saturating_duration_since(Instant::now());
                timers.question = Some(QuestionTimer::Paused { remaining });
                Some(remaining)
            }
            QuestionTimer::Paused { remaining } => {
                timers.question = Some(QuestionTimer::Paused { remaining });
                Some(remaining)
            }
        }
    }

    /// Re-arm a paused question deadline with the time that was left.
    ///
    /// Returns the time left, or `None` (dropping `on_timeout`) if the question
    /// slot was not paused.
    pub fn resume<F>(self: &Arc<Self>, room_id: SessionId, on_timeout: F) -> Option<Duration>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut rooms = self.lock();
        let timers = rooms.get_mut(&room_id)?;
        let Some(QuestionTimer::Paused { remaining }) = timers.question else {
            return None;
        };
        let deadline = Instant::now() + remaining;
        let armed = self.spawn(room_id, Slot::Question, deadline, on_timeout);
        timers.question = Some(QuestionTimer::Running { deadline, armed });
        Some(remaining)
    }

    pub fn question_state(&self, room_id: SessionId) -> QuestionTimerState {
        let rooms = self.lock();
        match rooms.get(&room_id).and_then(|t| t.question.as_ref()) {
            None => QuestionTimerState::Idle,
            Some(QuestionTimer::Running { deadline, .. }) => QuestionTimerState::Running {
                remaining: deadline.saturating_duration_since(Instant::now()),
            },
            Some(QuestionTimer::Paused { remaining }) => QuestionTimerState::Paused {
                remaining: *remaining,
            },
        }
    }

    pub fn has_pending_advance(&self, room_id: SessionId) -> bool {
        self.lock()
            .get(&room_id)
            .is_some_and(|t| t.advance.is_some())
    }

    /// Number of rooms with at least one armed slot
    pub fn room_count(&self) -> usize {
        self.lock().len()
    }

    /// Callers hold the room lock, so the task cannot claim before it is stored
    fn spawn<F>(self: &Arc<Self>, room_id: SessionId, slot: Slot, at: Instant, action: F) -> Armed
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(at).await;
            let claimed = scheduler
                .upgrade()
                .is_some_and(|s| s.claim(room_id, slot, generation));
            if claimed {
                action.await;
            }
        });
        Armed { generation, handle }
    }

    /// Empty the slot if it still holds `generation`
    fn claim(&self, room_id: SessionId, slot: Slot, generation: u64) -> bool {
        let mut rooms = self.lock();
        let Some(timers) = rooms.get_mut(&room_id) else {
            return false;
        };
        let claimed = match slot {
            Slot::Question => match &timers.question {
                Some(QuestionTimer::Running { armed, .. }) if armed.generation == generation => {
                    timers.question = None;
                    true
                }
                _ => false,
            },
            Slot::Advance => match &timers.advance {
                Some(armed) if armed.generation == generation => {
                    timers.advance = None;
                    true
                }
                _ => false,
            },
        };
        if timers.is_empty() {
            rooms.remove(&room_id);
        }
        claimed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, RoomTimers>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{pin::Pin, sync::atomic::AtomicUsize};

    fn room() -> SessionId {
        SessionId::new(1).unwrap()
    }

    type Action = Pin<Box<dyn Future<Output = ()> + Send>>;

    /// 発火回数を数えるアクションを作る
    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Action) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = fired.clone();
        let make = move || -> Action {
            let fired = handle.clone();
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_timer_fires_once_after_limit() {
        // テスト項目: 問題タイマーは制限時間後に一度だけ発火し、スロットは空になる
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (fired, action) = counter();

        // when (操作):
        scheduler.arm_question(room(), Duration::from_secs(5), action());
        tokio::time::sleep(Duration::from_millis(4900)).await;
        let before = fired.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // then (期待する結果):
        assert_eq!(before, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.question_state(room()), QuestionTimerState::Idle);
        assert_eq!(scheduler.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_cancels_previous_timer() {
        // テスト項目: 同じルームで問題を二度開始しても、有効なタイマーは常に一つ
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (first, first_action) = counter();
        let (second, second_action) = counter();

        // when (操作):
        scheduler.arm_question(room(), Duration::from_secs(5), first_action());
        scheduler.arm_question(room(), Duration::from_secs(10), second_action());
        tokio::time::sleep(Duration::from_secs(11)).await;

        // then (期待する結果):
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arming_question_cancels_pending_advance() {
        // テスト項目: 問題の開始は保留中の自動進行を取り消す
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (advanced, advance_action) = counter();
        let (_, question_action) = counter();
        scheduler.schedule_advance(room(), Duration::from_secs(5), advance_action());

        // when (操作):
        scheduler.arm_question(room(), Duration::from_secs(20), question_action());
        tokio::time::sleep(Duration::from_secs(6)).await;

        // then (期待する結果):
        assert_eq!(advanced.load(Ordering::SeqCst), 0);
        assert!(!scheduler.has_pending_advance(room()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_keep_remaining_time() {
        // テスト項目: 一時停止中は発火せず、再開後は残り時間で発火する
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (fired, action) = counter();
        scheduler.arm_question(room(), Duration::from_secs(10), action());
        tokio::time::sleep(Duration::from_secs(4)).await;

        // when (操作):
        let remaining = scheduler.pause(room());
        tokio::time::sleep(Duration::from_secs(30)).await;
        let fired_while_paused = fired.load(Ordering::SeqCst);
        let resumed = scheduler.resume(room(), action());
        tokio::time::sleep(Duration::from_millis(5900)).await;
        let before_deadline = fired.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // then (期待する結果):
        assert_eq!(remaining, Some(Duration::from_secs(6)));
        assert_eq!(resumed, Some(Duration::from_secs(6)));
        assert_eq!(fired_while_paused, 0);
        assert_eq!(before_deadline, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_without_pause_is_noop() {
        // テスト項目: 一時停止していないルームの再開は何もしない
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (fired, action) = counter();

        // when (操作):
        let resumed = scheduler.resume(room(), action());
        tokio::time::sleep(Duration::from_secs(100)).await;

        // then (期待する結果):
        assert_eq!(resumed, None);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_both_slots() {
        // テスト項目: cancel_all の後はどのタスクも発火しない
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (fired, action) = counter();
        scheduler.arm_question(room(), Duration::from_secs(5), action());
        scheduler.schedule_advance(room(), Duration::from_secs(1), action());

        // when (操作):
        scheduler.cancel_all(room());
        tokio::time::sleep(Duration::from_secs(10)).await;

        // then (期待する結果):
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claimed_task_survives_its_own_rearm() {
        // テスト項目: 発火したタスクは自分が張り直したタイマーで中断されない
        // given (前提条件):
        let scheduler = Arc::new(RoomScheduler::new());
        let (fired, action) = counter();
        let inner = scheduler.clone();
        let followed_up = Arc::new(AtomicUsize::new(0));
        let followed = followed_up.clone();

        // when (操作): advance の中で問題タイマーを張り直し、その後も処理を続ける
        scheduler.schedule_advance(room(), Duration::from_secs(1), async move {
            inner.arm_question(room(), Duration::from_secs(5), action());
            tokio::task::yield_now().await;
            followed.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(7)).await;

        // then (期待する結果):
        assert_eq!(followed_up.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
