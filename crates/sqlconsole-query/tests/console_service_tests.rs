//! Integration tests for ConsoleService
//!
//! Drives whole scripts through the public service API against mock
//! connections: splitting, ordered execution, error policy, cancellation,
//! timeouts, interceptors and virtual content.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use sqlconsole_core::Dialect;
use sqlconsole_query::{
    Cell, ConsoleConfig, ContentRequest, ExecuteOptions, ExecutionStatus, Payload,
    QueryServiceError, StatementOutcome, ValueEncoding,
};

use common::{Console, MockConnection, Reply, test_config, text_rows};

fn statuses(outcomes: &[StatementOutcome]) -> Vec<ExecutionStatus> {
    outcomes.iter().map(|o| o.status).collect()
}

// ============ Ordered execution ============

#[tokio::test]
async fn script_runs_in_order_with_one_result_per_statement() {
    let conn = MockConnection::new()
        .with_reply("select", Reply::Rows(text_rows(&["a"], vec![vec!["x"], vec!["y"]])))
        .with_reply("update", Reply::Affected(4));
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select a from t; update t set a = 'z';\ncreate table u (a int)",
            ExecuteOptions::new(),
        )
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|r| r.unit.sequence_index()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(results[0].table().map(|t| t.row_count()), Some(2));
    assert_eq!(results[1].update_count(), Some(4));
    assert_eq!(results[2].payload, Some(Payload::Void));
    assert_eq!(
        console.connection.query_log(),
        vec!["select a from t", "update t set a = 'z'", "create table u (a int)"]
    );
}

#[tokio::test]
async fn stop_on_error_leaves_canceled_placeholders() {
    let conn = MockConnection::new().with_reply("missing", Reply::Fail("Table 'missing' doesn't exist".into()));
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select 1; select * from missing; select 3",
            ExecuteOptions::new(),
        )
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(
        statuses(&results),
        vec![
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Canceled
        ]
    );
    let error = results[1].error.as_ref().unwrap();
    assert!(error.message.contains("doesn't exist"));
    assert_eq!(console.connection.query_log().len(), 2);
}

#[tokio::test]
async fn continue_on_error_option_runs_every_statement() {
    let conn = MockConnection::new().with_reply("missing", Reply::Fail("no such table".into()));
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select * from missing; select 2",
            ExecuteOptions::new().with_continue_on_error(true),
        )
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(
        statuses(&results),
        vec![ExecutionStatus::Failed, ExecutionStatus::Success]
    );
}

#[tokio::test]
async fn row_limit_option_truncates_results() {
    let data = (0..10).map(|_| vec!["v"]).collect();
    let conn = MockConnection::new().with_reply("select", Reply::Rows(text_rows(&["c"], data)));
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select c from t",
            ExecuteOptions::new().with_query_row_limit(4),
        )
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    let table = results[0].table().unwrap();
    assert_eq!(table.row_count(), 4);
    assert!(table.truncated);
}

// ============ Splitting ============

#[tokio::test]
async fn delimiter_pragma_keeps_procedure_body_intact() {
    let console = Console::mysql(MockConnection::new());
    let script = "DELIMITER $$\n\
                  CREATE PROCEDURE p() BEGIN SELECT 1; SELECT 2; END$$\n\
                  DELIMITER ;\n\
                  CALL p();";

    let batch_id = console
        .service
        .execute(console.session_id, script, ExecuteOptions::new())
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(
        console.connection.query_log(),
        vec!["CREATE PROCEDURE p() BEGIN SELECT 1; SELECT 2; END", "CALL p()"]
    );
}

#[tokio::test]
async fn malformed_pragma_rejects_whole_script() {
    let console = Console::mysql(MockConnection::new());

    let result = console
        .service
        .execute(console.session_id, "select 1;\nDELIMITER\nselect 2", ExecuteOptions::new());

    assert!(matches!(result, Err(QueryServiceError::Split(_))));
    assert!(console.connection.query_log().is_empty());
}

#[tokio::test]
async fn custom_initial_delimiter() {
    let console = Console::mysql(MockConnection::new());

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select 1; select 2 // select 3 //",
            ExecuteOptions::new().with_delimiter("//"),
        )
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(
        console.connection.query_log(),
        vec!["select 1; select 2", "select 3"]
    );
}

// ============ Cancellation and timeouts ============

#[tokio::test]
async fn cancel_fails_running_statement_and_cancels_the_rest() {
    let conn = MockConnection::new()
        .with_connection_id("31")
        .with_reply("sleep", Reply::Block);
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "select 1; select sleep(60); select 3; select 4",
            ExecuteOptions::new(),
        )
        .unwrap();

    let session = console.service.sessions().get(console.session_id).unwrap();
    let batch = session.batch(batch_id).unwrap();
    for _ in 0..500 {
        if batch.context().statuses().get(1) == Some(ExecutionStatus::Running) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    console.service.cancel(console.session_id, batch_id).unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(
        statuses(&results),
        vec![
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Canceled,
            ExecutionStatus::Canceled
        ]
    );
    assert_eq!(console.admin.query_log(), vec!["KILL QUERY 31".to_string()]);
}

#[tokio::test]
async fn wait_timeout_interrupts_long_statement() {
    let conn = MockConnection::new()
        .with_connection_id("5")
        .with_reply("sleep", Reply::Block);
    let config = test_config().with_batch_wait_timeout_ms(Some(50));
    let console = Console::open(config, conn, Dialect::MySql);

    let batch_id = console
        .service
        .execute(console.session_id, "select sleep(60); select 2", ExecuteOptions::new())
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();

    assert_eq!(
        statuses(&results),
        vec![ExecutionStatus::Failed, ExecutionStatus::Canceled]
    );
    assert_eq!(console.admin.query_log(), vec!["KILL QUERY 5".to_string()]);
}

#[tokio::test]
async fn poll_more_streams_results_incrementally() {
    let conn = MockConnection::new().with_reply("slow", Reply::Slow(Duration::from_millis(150)));
    let console = Console::open(
        test_config().with_poll_wait_ms(50),
        conn,
        Dialect::MySql,
    );

    let batch_id = console
        .service
        .execute(console.session_id, "select 1; select slow", ExecuteOptions::new())
        .unwrap();

    let mut seen = Vec::new();
    let mut rounds = 0;
    loop {
        let progress = console
            .service
            .poll_more(console.session_id, batch_id)
            .await
            .unwrap();
        seen.extend(progress.results);
        rounds += 1;
        if progress.finished || rounds > 100 {
            break;
        }
    }

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].unit.sequence_index(), 0);
    assert_eq!(seen[1].unit.sequence_index(), 1);
    assert!(rounds > 1);
}

// ============ Session state ============

#[tokio::test]
async fn time_zone_change_is_recorded_on_session() {
    let console = Console::mysql(MockConnection::new());

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "SET SESSION time_zone = '+08:00'",
            ExecuteOptions::new(),
        )
        .unwrap();
    console.service.poll(console.session_id, batch_id).await.unwrap();

    let session = console.service.sessions().get(console.session_id).unwrap();
    assert_eq!(session.time_zone().unwrap().as_deref(), Some("+08:00"));
}

#[tokio::test]
async fn session_directive_inside_longer_script_is_not_recorded() {
    let console = Console::mysql(MockConnection::new());

    let batch_id = console
        .service
        .execute(
            console.session_id,
            "SET time_zone = '+08:00'; select now()",
            ExecuteOptions::new(),
        )
        .unwrap();
    console.service.poll(console.session_id, batch_id).await.unwrap();

    let session = console.service.sessions().get(console.session_id).unwrap();
    assert_eq!(session.time_zone().unwrap(), None);
}

#[tokio::test]
async fn expired_session_rejects_requests() {
    let config = test_config().with_session_timeout_ms(20);
    let console = Console::open(config, MockConnection::new(), Dialect::MySql);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = console
        .service
        .execute(console.session_id, "select 1", ExecuteOptions::new());
    assert!(matches!(result, Err(QueryServiceError::SessionNotFound(_))));
}

#[tokio::test]
async fn closed_session_releases_connection() {
    let console = Console::mysql(MockConnection::new());

    console.service.close_session(console.session_id).await.unwrap();

    assert!(console.connection.closed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(console.service.sessions().is_empty());
    assert!(matches!(
        console.service.close_session(console.session_id).await,
        Err(QueryServiceError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn kill_session_uses_administrative_connection() {
    let console = Console::mysql(MockConnection::new());

    let outcome = console.service.kill_session(console.session_id, "812").await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(console.admin.query_log(), vec!["KILL 812".to_string()]);
    assert!(console.connection.query_log().is_empty());
}

// ============ Virtual content ============

#[tokio::test]
async fn large_cells_are_read_in_windows() {
    let long = "0123456789".repeat(10);
    let conn = MockConnection::new().with_reply(
        "select",
        Reply::Rows(text_rows(&["id", "body"], vec![vec!["1", long.as_str()]])),
    );
    let console = Console::mysql(conn);

    let batch_id = console
        .service
        .execute(console.session_id, "select id, body from docs", ExecuteOptions::new())
        .unwrap();
    let results = console.service.poll(console.session_id, batch_id).await.unwrap();
    let table = results[0].table().unwrap();

    let Cell::Virtual(cell) = &table.rows[0][1] else {
        panic!("expected body to be virtual, got {:?}", table.rows[0][1]);
    };
    assert_eq!(cell.size, 100);
    assert!(!table.rows[0][0].is_virtual());

    let request = ContentRequest::new(table.table_id.clone(), 0, 1)
        .with_window(10, 5)
        .with_encoding(ValueEncoding::Hex);
    let content = console
        .service
        .get_binary_content(console.session_id, &request)
        .unwrap();
    assert_eq!(content.data, b"3031323334".to_vec());
    assert_eq!(content.size, 100);

    let whole = console
        .service
        .get_binary_content(console.session_id, &ContentRequest::new(table.table_id.clone(), 0, 1))
        .unwrap();
    assert_eq!(whole.as_text(), long);

    let out_of_range = console.service.get_binary_content(
        console.session_id,
        &ContentRequest::new(table.table_id.clone(), 0, 1).with_window(101, 1),
    );
    assert!(matches!(out_of_range, Err(QueryServiceError::ContentRead(_))));
}

#[tokio::test]
async fn spool_dir_from_config_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let long = "x".repeat(64);
    let conn = MockConnection::new().with_reply(
        "select",
        Reply::Rows(text_rows(&["body"], vec![vec![long.as_str()]])),
    );
    let config: ConsoleConfig = test_config().with_spool_dir(dir.path());
    let console = Console::open(config, conn, Dialect::MySql);

    let batch_id = console
        .service
        .execute(console.session_id, "select body from t", ExecuteOptions::new())
        .unwrap();
    console.service.poll(console.session_id, batch_id).await.unwrap();

    let spools: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(spools.len(), 1);
}
