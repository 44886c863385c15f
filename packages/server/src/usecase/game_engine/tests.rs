//! GameEngine のシナリオテスト
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MessageHandler::handle_message() の各メッセージタイプの振り分け
//! - 問題タイマーによる自動進行（question_end → leaderboard → 次の問題 / quiz_end）
//! - 一時停止・再開・ホスト切断時のタイマー制御
//!
//! ### なぜこのテストが必要か
//! - 自動進行は複数のタイマーと Repository 更新が絡むため、順序の回帰を検出したい
//! - エラーコードはクライアントとの契約なので、経路ごとに固定しておく
//!
//! ### どのような状況を想定しているか
//! - 正常系：開始から自動終了までの一連の流れ
//! - 異常系：未参加・権限なし・問題切れ・永続化失敗・インデックス競合
//! - エッジケース：終了済みセッションへの end_quiz、未知のメッセージタイプ
//!
//! tokio の仮想時間（start_paused）で動かすため、時計もそれに合わせて進める。

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hayaoshi_shared::time::Clock;
use serde_json::{Value, json};
use tokio::{sync::mpsc, time::Instant};

use super::*;
use crate::{
    config::GameSettings,
    domain::{
        AnswerOption, ConnectionIdentity, Enqueue, JoinCode, NewParticipant, NewSession,
        ParticipantId, QuestionId, QuestionType, QuizId, RepositoryError, SessionStatus,
        TimeLimit, UserId, repository::MockSessionRepository,
    },
    infrastructure::repository::{InMemoryQuestionRepository, InMemorySessionRepository},
};

const HOST_USER: i64 = 1;
const PLAYER_USER: i64 = 42;

/// tokio の仮想時間と一緒に進む時計
struct PausedClock {
    base: DateTime<Utc>,
    start: Instant,
}

impl PausedClock {
    fn new() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            start: Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }
}

struct Broadcast {
    message: Value,
    exclude: Option<ConnectionId>,
}

/// ブロードキャストを記録し、個別送信は接続のキューに積む Hub
#[derive(Default)]
struct FakeHub {
    broadcasts: Mutex<Vec<Broadcast>>,
}

impl FakeHub {
    fn take(&self) -> Vec<Broadcast> {
        std::mem::take(&mut *self.broadcasts.lock().unwrap())
    }

    fn take_types(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .map(|b| b.message["type"].as_str().unwrap().to_string())
            .collect()
    }
}

#[async_trait]
impl Hub for FakeHub {
    async fn register(&self, _conn: Arc<Connection>) {}

    async fn unregister(&self, _conn: Arc<Connection>) {}

    async fn broadcast_to_room(
        &self,
        _room_id: SessionId,
        frame: OutboundFrame,
        exclude: Option<ConnectionId>,
    ) {
        self.broadcasts.lock().unwrap().push(Broadcast {
            message: serde_json::from_str(&frame).unwrap(),
            exclude,
        });
    }

    fn send_to_client(&self, conn: &Connection, frame: OutboundFrame) -> bool {
        conn.try_enqueue(frame) == Enqueue::Queued
    }

    async fn room_clients(&self, _room_id: SessionId) -> Vec<Arc<Connection>> {
        Vec::new()
    }

    async fn room_client_count(&self, _room_id: SessionId) -> usize {
        0
    }
}

fn quiz_id() -> QuizId {
    QuizId::new(7).unwrap()
}

fn questions() -> Vec<Question> {
    vec![
        Question {
            id: QuestionId::new(1).unwrap(),
            quiz_id: quiz_id(),
            text: "What is the capital of Japan?".to_string(),
            question_type: QuestionType::SingleChoice,
            answers: vec![
                AnswerOption {
                    text: "Tokyo".to_string(),
                    is_correct: true,
                },
                AnswerOption {
                    text: "Osaka".to_string(),
                    is_correct: false,
                },
            ],
            time_limit: TimeLimit::from_secs(5).unwrap(),
            index: 0,
        },
        Question {
            id: QuestionId::new(2).unwrap(),
            quiz_id: quiz_id(),
            text: "Which are prime numbers?".to_string(),
            question_type: QuestionType::MultipleChoice,
            answers: vec![
                AnswerOption {
                    text: "2".to_string(),
                    is_correct: true,
                },
                AnswerOption {
                    text: "3".to_string(),
                    is_correct: true,
                },
                AnswerOption {
                    text: "4".to_string(),
                    is_correct: false,
                },
            ],
            time_limit: TimeLimit::from_secs(10).unwrap(),
            index: 1,
        },
    ]
}

struct Room {
    engine: GameEngine,
    hub: Arc<FakeHub>,
    sessions: Arc<InMemorySessionRepository>,
    room_id: SessionId,
}

/// ホスト（user 1）とプレイヤー（user 42）が登録済みの待機中セッション
async fn setup() -> Room {
    setup_with(questions()).await
}

async fn setup_with(questions: Vec<Question>) -> Room {
    let clock: Arc<dyn Clock> = Arc::new(PausedClock::new());
    let sessions = Arc::new(InMemorySessionRepository::new(clock.clone()));
    let session = sessions
        .create(NewSession {
            quiz_id: quiz_id(),
            host_id: Some(UserId::new(HOST_USER).unwrap()),
            join_code: JoinCode::parse("ABC123").unwrap(),
            max_participants: None,
        })
        .await
        .unwrap();
    for (user, nickname, is_host) in [(HOST_USER, "Host", true), (PLAYER_USER, "Alice", false)] {
        sessions
            .add_participant(NewParticipant {
                session_id: session.id,
                user_id: Some(UserId::new(user).unwrap()),
                nickname: nickname.to_string(),
                is_host,
            })
            .await
            .unwrap();
    }

    let hub = Arc::new(FakeHub::default());
    let engine = GameEngine::new(
        sessions.clone(),
        Arc::new(InMemoryQuestionRepository::new(questions)),
        hub.clone(),
        clock,
        GameSettings::default(),
    );
    Room {
        engine,
        hub,
        sessions,
        room_id: session.id,
    }
}

fn message(kind: &str, payload: Value) -> InboundMessage {
    InboundMessage {
        kind: kind.to_string(),
        payload,
    }
}

/// 接続に届いた個別メッセージを全て取り出す
fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

impl Room {
    async fn join(&self, user: i64) -> (Arc<Connection>, mpsc::Receiver<OutboundFrame>) {
        let (conn, mut rx) = Connection::new(self.room_id, 32);
        self.engine
            .handle_message(conn.clone(), message("join", json!({ "user_id": user })))
            .await;
        drain(&mut rx);
        self.hub.take();
        (conn, rx)
    }

    async fn send(&self, conn: &Arc<Connection>, kind: &str) {
        self.engine
            .handle_message(conn.clone(), message(kind, Value::Null))
            .await;
    }

    async fn current_index(&self) -> i32 {
        self.sessions
            .get_by_id(self.room_id)
            .await
            .unwrap()
            .current_question_index
    }
}

fn error_code(frames: &[Value]) -> Option<&str> {
    frames
        .iter()
        .find(|f| f["type"] == "error")
        .and_then(|f| f["payload"]["code"].as_str())
}

#[tokio::test(start_paused = true)]
async fn test_join_sends_success_then_room_notifications() {
    // テスト項目: join 成功時は本人に join_success、ルームに参加通知と参加者一覧が届く
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.engine
        .handle_message(
            conn.clone(),
            message("join", json!({ "user_id": PLAYER_USER })),
        )
        .await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "join_success");
    assert_eq!(frames[0]["payload"]["is_host"], false);
    assert_eq!(frames[0]["payload"]["participant"]["nickname"], "Alice");

    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0].message["type"], "participant_join");
    assert_eq!(broadcasts[1].message["type"], "participant_list_update");
    assert_eq!(broadcasts[1].message["payload"]["participant_count"], 2);
    assert_eq!(
        broadcasts[1].message["payload"]["trigger"],
        "websocket_connection"
    );

    let identity = conn.identity();
    assert!(identity.participant_id.is_some());
    assert!(!identity.is_host);
}

#[tokio::test(start_paused = true)]
async fn test_join_unknown_user_is_rejected_without_broadcast() {
    // テスト項目: HTTP で登録されていない user_id の join は PARTICIPANT_NOT_FOUND
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.engine
        .handle_message(conn.clone(), message("join", json!({ "user_id": 999 })))
        .await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("PARTICIPANT_NOT_FOUND"));
    assert!(room.hub.take().is_empty());
    assert!(conn.participant_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_join_without_user_id_is_rejected() {
    // テスト項目: user_id を省略した join は USER_ID_REQUIRED
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.engine
        .handle_message(conn, message("join", json!({ "nickname": "Bob" })))
        .await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("USER_ID_REQUIRED"));
}

#[tokio::test(start_paused = true)]
async fn test_quiz_runs_to_completion_on_timers() {
    // テスト項目: start_quiz 以降、ホストの操作なしで最後まで進行する
    // given (前提条件):
    let room = setup().await;
    let (host, _host_rx) = room.join(HOST_USER).await;

    // when (操作):
    room.send(&host, "start_quiz").await;

    // then (期待する結果):
    assert_eq!(room.hub.take_types(), vec!["quiz_start"]);

    // 1 秒後に最初の問題
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 1);
    let question = &broadcasts[0].message["payload"];
    assert_eq!(broadcasts[0].message["type"], "question_start");
    assert_eq!(question["question"]["index"], 0);
    assert_eq!(question["question"]["max_score"], 1000);
    assert_eq!(question["server_time_limit"], 5);
    assert_eq!(question["auto_advance"], true);
    assert!(question["question"]["answers"][0].get("is_correct").is_none());
    assert_eq!(room.current_index().await, 0);

    // 制限時間 5 秒で終了し、途中結果
    tokio::time::sleep(Duration::from_secs(5)).await;
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0].message["type"], "question_end");
    assert_eq!(broadcasts[1].message["type"], "leaderboard");
    assert_eq!(
        broadcasts[1].message["payload"]["next_action"],
        "auto_next_question"
    );
    assert_eq!(broadcasts[1].message["payload"]["display_time"], 5);

    // 表示 5 秒後に次の問題
    tokio::time::sleep(Duration::from_secs(5)).await;
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].message["type"], "question_start");
    assert_eq!(broadcasts[0].message["payload"]["question"]["index"], 1);
    assert_eq!(room.current_index().await, 1);

    // 最後の問題の後は自動終了の予告
    tokio::time::sleep(Duration::from_secs(10)).await;
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0].message["type"], "question_end");
    assert_eq!(
        broadcasts[1].message["payload"]["next_action"],
        "auto_end_quiz"
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 1);
    let end = &broadcasts[0].message["payload"];
    assert_eq!(broadcasts[0].message["type"], "quiz_end");
    assert_eq!(end["auto_ended"], true);
    assert_eq!(end["completion_reason"], "all_questions_completed");
    assert_eq!(end["status"], "completed");
    assert_eq!(end["final_leaderboard"].as_array().unwrap().len(), 2);

    let session = room.sessions.get_by_id(room.room_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(room.engine.scheduled_rooms(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_player_cannot_start_quiz() {
    // テスト項目: ホスト以外の start_quiz は UNAUTHORIZED
    // given (前提条件):
    let room = setup().await;
    let (player, mut rx) = room.join(PLAYER_USER).await;

    // when (操作):
    room.send(&player, "start_quiz").await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("UNAUTHORIZED"));
    assert!(room.hub.take().is_empty());
    let session = room.sessions.get_by_id(room.room_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_player_cannot_advance_question() {
    // テスト項目: ホスト以外の next_question は本人にだけ UNAUTHORIZED が返り、進行は変わらない
    // given (前提条件):
    let room = setup().await;
    let (host, _host_rx) = room.join(HOST_USER).await;
    let (player, mut rx) = room.join(PLAYER_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    room.hub.take();
    drain(&mut rx);

    // when (操作):
    room.send(&player, "next_question").await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(error_code(&frames), Some("UNAUTHORIZED"));
    assert!(room.hub.take().is_empty());
    assert_eq!(room.current_index().await, 0);
    let session = room.sessions.get_by_id(room.room_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert!(matches!(
        room.engine.question_timer(room.room_id),
        QuestionTimerState::Running { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_quiz_twice_is_rejected() {
    // テスト項目: 開始済みセッションへの start_quiz は INVALID_STATUS
    // given (前提条件):
    let room = setup().await;
    let (host, mut rx) = room.join(HOST_USER).await;
    room.send(&host, "start_quiz").await;
    room.hub.take();
    drain(&mut rx);

    // when (操作):
    room.send(&host, "start_quiz").await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("INVALID_STATUS"));
    assert!(room.hub.take().is_empty());
    let session = room.sessions.get_by_id(room.room_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_start_quiz_without_questions_is_rejected() {
    // テスト項目: 問題が 1 つもないクイズの start_quiz は NO_QUESTIONS で、待機中のまま
    // given (前提条件):
    let room = setup_with(Vec::new()).await;
    let (host, mut rx) = room.join(HOST_USER).await;

    // when (操作):
    room.send(&host, "start_quiz").await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("NO_QUESTIONS"));
    assert!(room.hub.take().is_empty());
    let session = room.sessions.get_by_id(room.room_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(room.engine.scheduled_rooms(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_next_question_past_last_keeps_index() {
    // テスト項目: 最後の問題で next_question すると question_end の後に NO_MORE_QUESTIONS
    // given (前提条件):
    let room = setup().await;
    let (host, mut rx) = room.join(HOST_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    room.send(&host, "next_question").await;
    assert_eq!(room.current_index().await, 1);
    room.hub.take();

    // when (操作):
    room.send(&host, "next_question").await;

    // then (期待する結果):
    assert_eq!(room.hub.take_types(), vec!["question_end"]);
    assert_eq!(error_code(&drain(&mut rx)), Some("NO_MORE_QUESTIONS"));
    assert_eq!(room.current_index().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_correct_answer_is_scored_by_time() {
    // テスト項目: 正解は経過時間に応じて採点され、スコアに加算される
    // given (前提条件):
    let room = setup().await;
    let (player, mut rx) = room.join(PLAYER_USER).await;

    // when (操作):
    room.engine
        .handle_message(
            player.clone(),
            message(
                "answer",
                json!({ "question_id": 1, "answer_value": "Tokyo", "time_taken": 2500 }),
            ),
        )
        .await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(frames[0]["type"], "answer_received");
    assert_eq!(frames[0]["payload"]["is_correct"], true);
    assert_eq!(frames[0]["payload"]["score_earned"], 975);
    assert_eq!(frames[0]["payload"]["time_taken"], 2500);
    assert!(room.hub.take().is_empty());

    let leaderboard = room.sessions.get_leaderboard(room.room_id).await.unwrap();
    assert_eq!(leaderboard[0].nickname, "Alice");
    assert_eq!(leaderboard[0].score, 975);
}

#[tokio::test(start_paused = true)]
async fn test_incorrect_multiple_choice_scores_zero() {
    // テスト項目: 複数選択で正解集合と一致しない回答は 0 点
    // given (前提条件):
    let room = setup().await;
    let (player, mut rx) = room.join(PLAYER_USER).await;

    // when (操作):
    room.engine
        .handle_message(
            player,
            message(
                "answer",
                json!({ "question_id": 2, "answer_values": ["2"], "time_taken": 100 }),
            ),
        )
        .await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(frames[0]["payload"]["is_correct"], false);
    assert_eq!(frames[0]["payload"]["score_earned"], 0);
    let leaderboard = room.sessions.get_leaderboard(room.room_id).await.unwrap();
    assert!(leaderboard.iter().all(|row| row.score == 0));
}

#[tokio::test(start_paused = true)]
async fn test_answer_before_join_is_rejected() {
    // テスト項目: join 前の answer は NOT_JOINED
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.engine
        .handle_message(
            conn,
            message("answer", json!({ "question_id": 1, "answer_value": "Tokyo" })),
        )
        .await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("NOT_JOINED"));
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_and_resume_rearms_question_timer() {
    // テスト項目: 一時停止中は問題が終了せず、再開後に残り時間で終了する
    // given (前提条件): 5 秒の問題が開始して 2 秒経過
    let room = setup().await;
    let (host, _rx) = room.join(HOST_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    room.hub.take();

    // when (操作):
    room.send(&host, "pause_quiz").await;

    // then (期待する結果):
    let paused = room.hub.take();
    assert_eq!(paused[0].message["type"], "game_paused");
    assert_eq!(paused[0].message["payload"]["reason"], "host_requested");
    let remaining = paused[0].message["payload"]["remaining_ms"].as_u64().unwrap();
    assert!((2_900..=3_000).contains(&remaining));
    assert!(matches!(
        room.engine.question_timer(room.room_id),
        QuestionTimerState::Paused { .. }
    ));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(room.hub.take().is_empty());

    // when (操作):
    room.send(&host, "resume_quiz").await;

    // then (期待する結果):
    let resumed = room.hub.take();
    assert_eq!(resumed[0].message["type"], "game_resumed");
    assert!(resumed[0].message["payload"]["deadline"].is_string());

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(room.hub.take().is_empty());
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let types = room.hub.take_types();
    assert_eq!(types, vec!["question_end", "leaderboard"]);
}

#[tokio::test(start_paused = true)]
async fn test_host_disconnect_pauses_room() {
    // テスト項目: ホスト切断でタイマーが止まり、残りの参加者に game_paused が届く
    // given (前提条件):
    let room = setup().await;
    let (host, _host_rx) = room.join(HOST_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    room.hub.take();

    // when (操作):
    room.engine.handle_disconnect(host.clone()).await;

    // then (期待する結果):
    let broadcasts = room.hub.take();
    let types: Vec<&str> = broadcasts
        .iter()
        .map(|b| b.message["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["participant_left", "participant_list_update", "game_paused"]
    );
    assert_eq!(
        broadcasts[1].message["payload"]["trigger"],
        "participant_disconnect"
    );
    assert_eq!(broadcasts[2].message["payload"]["reason"], "host_disconnected");
    assert_eq!(broadcasts[2].exclude.as_ref(), Some(host.id()));
    assert_eq!(
        room.engine.question_timer(room.room_id),
        QuestionTimerState::Idle
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(room.hub.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_before_join_is_silent() {
    // テスト項目: join していない接続の切断では何も通知しない
    // given (前提条件):
    let room = setup().await;
    let (conn, _rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.engine.handle_disconnect(conn).await;

    // then (期待する結果):
    assert!(room.hub.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_end_quiz_twice_reports_already_ended() {
    // テスト項目: ホストが終了したセッションへの end_quiz は ALREADY_ENDED
    // given (前提条件):
    let room = setup().await;
    let (host, mut rx) = room.join(HOST_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    room.hub.take();

    // when (操作):
    room.send(&host, "end_quiz").await;

    // then (期待する結果):
    let broadcasts = room.hub.take();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0].message["type"], "question_end");
    let end = &broadcasts[1].message["payload"];
    assert_eq!(end["auto_ended"], false);
    assert_eq!(end["completion_reason"], "host_ended");
    assert_eq!(end["server_driven"], false);

    // when (操作):
    room.send(&host, "end_quiz").await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("ALREADY_ENDED"));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(room.hub.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_state_hides_correct_answers() {
    // テスト項目: get_session_state は現在の問題を正解フラグなしで返す
    // given (前提条件):
    let room = setup().await;
    let (host, _host_rx) = room.join(HOST_USER).await;
    let (player, mut rx) = room.join(PLAYER_USER).await;
    room.send(&host, "start_quiz").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // when (操作):
    room.send(&player, "get_session_state").await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    let state = &frames[0]["payload"];
    assert_eq!(frames[0]["type"], "session_state");
    assert_eq!(state["session"]["status"], "active");
    assert_eq!(state["session"]["current_question_index"], 0);
    assert_eq!(state["participants"].as_array().unwrap().len(), 2);
    assert_eq!(state["current_question"]["id"], 1);
    assert!(state["current_question"].get("max_score").is_none());
    for answer in state["current_question"]["answers"].as_array().unwrap() {
        assert!(answer.get("is_correct").is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn test_ping_replies_pong() {
    // テスト項目: ping には本人にだけ pong を返す
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = Connection::new(room.room_id, 32);

    // when (操作):
    room.send(&conn, "ping").await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "pong");
    assert!(room.hub.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_message_type_is_dropped() {
    // テスト項目: 未知のメッセージタイプは応答なしで破棄される
    // given (前提条件):
    let room = setup().await;
    let (conn, mut rx) = room.join(PLAYER_USER).await;

    // when (操作):
    room.engine
        .handle_message(conn, message("chat", json!({ "text": "hi" })))
        .await;

    // then (期待する結果):
    assert!(drain(&mut rx).is_empty());
    assert!(room.hub.take().is_empty());
}

fn active_session(current_question_index: i32) -> QuizSession {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    QuizSession {
        id: SessionId::new(1).unwrap(),
        quiz_id: quiz_id(),
        host_id: Some(UserId::new(HOST_USER).unwrap()),
        join_code: JoinCode::parse("ABC123").unwrap(),
        status: SessionStatus::Active,
        current_question_index,
        max_participants: None,
        participant_count: 2,
        created_at: now,
        started_at: Some(now),
        ended_at: None,
        updated_at: now,
    }
}

fn engine_with(sessions: MockSessionRepository, hub: Arc<FakeHub>) -> GameEngine {
    GameEngine::new(
        Arc::new(sessions),
        Arc::new(InMemoryQuestionRepository::new(questions())),
        hub,
        Arc::new(PausedClock::new()),
        GameSettings::default(),
    )
}

fn bound_connection(is_host: bool) -> (Arc<Connection>, mpsc::Receiver<OutboundFrame>) {
    let (conn, rx) = Connection::new(SessionId::new(1).unwrap(), 32);
    conn.bind_participant(ConnectionIdentity {
        participant_id: Some(ParticipantId::new(10).unwrap()),
        user_id: Some(UserId::new(HOST_USER).unwrap()),
        nickname: "Host".to_string(),
        is_host,
    });
    (conn, rx)
}

#[tokio::test(start_paused = true)]
async fn test_score_update_failure_is_reported() {
    // テスト項目: スコア加算に失敗すると SCORE_UPDATE_FAILED を返し、詳細は隠す
    // given (前提条件):
    let mut sessions = MockSessionRepository::new();
    sessions
        .expect_update_participant_score()
        .times(1)
        .returning(|_, _| Err(RepositoryError::Storage("disk full".to_string())));
    let engine = engine_with(sessions, Arc::new(FakeHub::default()));
    let (conn, mut rx) = bound_connection(false);

    // when (操作):
    engine
        .handle_message(
            conn,
            message("answer", json!({ "question_id": 1, "answer_value": "Tokyo" })),
        )
        .await;

    // then (期待する結果):
    let frames = drain(&mut rx);
    assert_eq!(error_code(&frames), Some("SCORE_UPDATE_FAILED"));
    assert_eq!(frames[0]["payload"]["message"], "Failed to update score");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_advance_reports_question_conflict() {
    // テスト項目: 他の経路が先に問題を進めていた場合は QUESTION_CONFLICT
    // given (前提条件):
    let mut sessions = MockSessionRepository::new();
    sessions
        .expect_get_by_id()
        .returning(|_| Ok(active_session(0)));
    sessions
        .expect_update_current_question_index()
        .times(1)
        .returning(|_, expected, _| {
            Err(RepositoryError::IndexConflict {
                expected,
                actual: 1,
            })
        });
    let hub = Arc::new(FakeHub::default());
    let engine = engine_with(sessions, hub.clone());
    let (conn, mut rx) = bound_connection(true);

    // when (操作):
    engine
        .handle_message(conn, message("next_question", Value::Null))
        .await;

    // then (期待する結果):
    assert_eq!(error_code(&drain(&mut rx)), Some("QUESTION_CONFLICT"));
    assert_eq!(hub.take_types(), vec!["question_end"]);
    assert_eq!(
        engine.question_timer(SessionId::new(1).unwrap()),
        QuestionTimerState::Idle
    );
}
