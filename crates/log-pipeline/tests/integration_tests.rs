//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 로그 파일 tail부터 HTTP 수집 서버 전달, 종료 시 디스크 보존,
//! 재시작 복구까지의 흐름을 mockito 서버로 검증합니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mockito::{Matcher, Server};

use logship_core::config::SourceConfig;
use logship_core::pipeline::{HealthStatus, Pipeline};
use logship_core::types::SourceKind;
use logship_log_pipeline::{
    AgentPipeline, AgentPipelineBuilder, HttpSender, OverflowStore, PipelineConfig,
    PipelineConfigBuilder, SenderSettings,
};

const OK_BODY: &str = r#"{"status":"success","message":"inserted"}"#;
const WAIT: Duration = Duration::from_secs(5);

fn sender_settings(base_url: &str) -> SenderSettings {
    SenderSettings {
        agent_id: "agent-it".to_owned(),
        ingest_url: format!("{base_url}/query"),
        health_url: format!("{base_url}/health"),
        database: "siem".to_owned(),
        collection: "events".to_owned(),
        timeout: Duration::from_secs(2),
        retry_interval: Duration::from_millis(10),
        max_retries: 0,
    }
}

fn pipeline_config(state_dir: &Path, sources: Vec<SourceConfig>) -> PipelineConfig {
    let mut builder = PipelineConfigBuilder::new()
        .agent_id("agent-it")
        .hostname("it-host")
        .overflow_path(state_dir.join("buffer.json"))
        .offset_dir(state_dir.join("offsets"))
        .send_interval_secs(3600)
        .shutdown_timeout_secs(2)
        .poll_interval_ms(20)
        .reopen_delay_ms(10);
    for source in sources {
        builder = builder.source(source);
    }
    builder.build().expect("valid pipeline config")
}

fn build(config: PipelineConfig, base_url: &str) -> AgentPipeline<HttpSender> {
    let sender = HttpSender::new(sender_settings(base_url)).expect("sender");
    AgentPipelineBuilder::new()
        .config(config)
        .sink(sender)
        .build()
        .expect("pipeline")
}

fn write_log(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write log");
    path
}

fn source(kind: SourceKind, path: &Path) -> SourceConfig {
    SourceConfig::new(kind, path.to_string_lossy())
}

async fn wait_for_buffer(pipeline: &AgentPipeline<HttpSender>, expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while pipeline.buffer_size().await != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "buffer never reached {expected} events"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// 여러 소스의 이벤트가 하나의 배치로 수집 서버에 도착
#[tokio::test]
async fn test_tailed_events_reach_collector() {
    let logs = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let auth = write_log(
        logs.path(),
        "auth.log",
        "Jun  1 12:00:00 web-01 sshd[42]: Failed password for root from 10.0.0.5\n",
    );
    let history = write_log(logs.path(), "history", "whoami\n");

    let mut server = Server::new_async().await;
    let _health = server
        .mock("GET", "/health")
        .with_status(200)
        .create_async()
        .await;
    let ingest = server
        .mock("POST", "/query")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(serde_json::json!({
                "database": "siem",
                "collection": "events",
            })),
            Matcher::Regex(r#""event_type":"login_failed""#.to_owned()),
            Matcher::Regex(r#""command":"whoami""#.to_owned()),
            Matcher::Regex(r#""hostname":"it-host""#.to_owned()),
        ]))
        .with_status(200)
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;

    let config = pipeline_config(
        state.path(),
        vec![
            source(SourceKind::Auth, &auth),
            source(SourceKind::BashHistory, &history),
        ],
    );
    let mut pipeline = build(config, &server.url());

    pipeline.start().await.unwrap();
    assert_eq!(pipeline.active_sources(), 2);
    wait_for_buffer(&pipeline, 2).await;

    assert_eq!(pipeline.drain_now().await.unwrap(), 2);
    ingest.assert_async().await;

    pipeline.stop().await.unwrap();
    assert!(!state.path().join("buffer.json").exists());
}

/// 수집 서버 장애 동안 배치가 유지되고 복구 후 같은 순서로 전달됨
#[tokio::test]
async fn test_batch_survives_collector_outage() {
    let logs = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let history = write_log(logs.path(), "history", "one\ntwo\n");

    let mut server = Server::new_async().await;
    let outage = server
        .mock("POST", "/query")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let config = pipeline_config(state.path(), vec![source(SourceKind::BashHistory, &history)]);
    let mut pipeline = build(config, &server.url());
    pipeline.start().await.unwrap();
    wait_for_buffer(&pipeline, 2).await;

    assert!(pipeline.drain_now().await.is_err());
    assert_eq!(pipeline.buffer_size().await, 2);
    assert!(matches!(
        pipeline.health_check().await,
        HealthStatus::Degraded(_)
    ));
    outage.assert_async().await;
    outage.remove_async().await;

    let recovered = server
        .mock("POST", "/query")
        .match_body(Matcher::Regex(
            r#""command":"one".*"command":"two""#.to_owned(),
        ))
        .with_status(200)
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;

    assert_eq!(pipeline.drain_now().await.unwrap(), 2);
    recovered.assert_async().await;
    assert!(pipeline.health_check().await.is_healthy());

    pipeline.stop().await.unwrap();
}

/// 헬스 체크가 503이어도 에이전트는 시작하고 이벤트를 버퍼링함
#[tokio::test]
async fn test_starts_when_health_check_fails() {
    let logs = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let history = write_log(logs.path(), "history", "id\n");

    let mut server = Server::new_async().await;
    let health = server
        .mock("GET", "/health")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let config = pipeline_config(state.path(), vec![source(SourceKind::BashHistory, &history)]);
    let mut pipeline = build(config, &server.url());

    pipeline.start().await.unwrap();
    health.assert_async().await;
    assert_eq!(pipeline.state_name(), "running");
    wait_for_buffer(&pipeline, 1).await;

    pipeline.stop().await.unwrap();
}

/// 종료 시 미전송 이벤트는 디스크로, 재시작 시 다시 전송됨
#[tokio::test]
async fn test_undelivered_events_survive_restart() {
    let logs = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let history = write_log(logs.path(), "history", "alpha\nbeta\ngamma\n");
    let config = pipeline_config(state.path(), vec![source(SourceKind::BashHistory, &history)]);

    // 1. 수집 서버 없이 실행 후 종료
    let mut first = build(config.clone(), "http://127.0.0.1:9");
    first.start().await.unwrap();
    wait_for_buffer(&first, 3).await;
    first.stop().await.unwrap();

    let snapshot = OverflowStore::new(state.path().join("buffer.json"));
    let saved = snapshot.load().await.unwrap();
    let commands: Vec<_> = saved.iter().filter_map(|e| e.command()).collect();
    assert_eq!(commands, vec!["alpha", "beta", "gamma"]);

    // 2. 파일에 새 라인 추가 후 재시작
    std::fs::write(&history, "alpha\nbeta\ngamma\ndelta\n").unwrap();

    let mut server = Server::new_async().await;
    let ingest = server
        .mock("POST", "/query")
        .match_body(Matcher::Regex(
            r#""command":"alpha".*"command":"beta".*"command":"gamma".*"command":"delta""#
                .to_owned(),
        ))
        .with_status(200)
        .with_body(OK_BODY)
        .expect(1)
        .create_async()
        .await;

    let mut second = build(config, &server.url());
    second.start().await.unwrap();
    assert!(!snapshot.exists().await);
    wait_for_buffer(&second, 4).await;

    assert_eq!(second.drain_now().await.unwrap(), 4);
    ingest.assert_async().await;
    second.stop().await.unwrap();
}

/// 잘못된 설정은 빌드 단계에서 거부
#[test]
fn test_builder_rejects_config_without_sources() {
    let sender = HttpSender::new(sender_settings("http://127.0.0.1:9")).unwrap();
    let result = AgentPipelineBuilder::new()
        .config(PipelineConfig::default())
        .sink(sender)
        .build();
    assert!(result.is_err());
}
