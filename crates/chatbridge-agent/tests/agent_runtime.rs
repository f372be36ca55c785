//! Page agent runtime tests on a paused tokio clock.

use std::time::Duration;

use chatbridge_agent::{AgentSettings, ElementKind, MemoryPage, NodeSnapshot, PageAgent, PageEvent};
use chatbridge_protocol::{AgentMessage, Body, Envelope, Provider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

const CLAUDE_MESSAGE: &str = "[data-testid=\"message\"]";

struct Harness {
    events: mpsc::Sender<PageEvent>,
    inbound: mpsc::Sender<Envelope>,
    outbound: mpsc::Receiver<AgentMessage>,
    task: JoinHandle<()>,
}

fn settings() -> AgentSettings {
    AgentSettings {
        debounce: Duration::from_millis(1000),
        context_messages: 6,
        initial_capture_delay: None,
    }
}

fn spawn_agent(page: MemoryPage, settings: AgentSettings, outbound_capacity: usize) -> Harness {
    let (out_tx, out_rx) = mpsc::channel(outbound_capacity);
    let (ev_tx, ev_rx) = mpsc::channel(16);
    let (in_tx, in_rx) = mpsc::channel(16);
    let agent = PageAgent::new(page, settings, out_tx);
    let task = tokio::spawn(agent.run(ev_rx, in_rx));
    Harness {
        events: ev_tx,
        inbound: in_tx,
        outbound: out_rx,
        task,
    }
}

fn claude_page() -> MemoryPage {
    MemoryPage::new("https://claude.ai/chat", "T")
}

fn message_node() -> NodeSnapshot {
    NodeSnapshot::new("div").with_attr("data-testid", "message")
}

async fn expect_capture(rx: &mut mpsc::Receiver<AgentMessage>) -> Envelope {
    match rx.recv().await {
        Some(AgentMessage::Capture(env)) => env,
        other => panic!("expected capture, got {:?}", other),
    }
}

async fn expect_silence(rx: &mut mpsc::Receiver<AgentMessage>) {
    let next = timeout(Duration::from_secs(10), rx.recv()).await;
    assert!(next.is_err(), "unexpected message: {:?}", next);
}

fn push_body(env: &Envelope) -> (&str, &str) {
    match &env.body {
        Body::Push(b) => (b.selection.as_str(), b.context.as_str()),
        other => panic!("expected push body, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_registers_exactly_once() {
    let mut h = spawn_agent(claude_page(), settings(), 8);

    match h.outbound.recv().await {
        Some(AgentMessage::RegisterTab(reg)) => {
            assert_eq!(reg.url, "https://claude.ai/chat");
            assert_eq!(reg.title, "T");
            assert_eq!(reg.provider, Some(Provider::Claude));
        }
        other => panic!("expected registration, got {:?}", other),
    }
    expect_silence(&mut h.outbound).await;

    drop(h.events);
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_mutation_burst_produces_one_capture_after_last_plus_window() {
    let page = claude_page();
    for i in 1..=8 {
        page.add_message(CLAUDE_MESSAGE, &format!("  message {}  ", i));
    }
    let mut h = spawn_agent(page, settings(), 8);
    h.outbound.recv().await.unwrap();

    let start = Instant::now();
    for _ in 0..3 {
        h.events
            .send(PageEvent::Mutations(vec![message_node()]))
            .await
            .unwrap();
        sleep(Duration::from_millis(300)).await;
    }

    let env = expect_capture(&mut h.outbound).await;
    // Last mutation at 600ms, window 1000ms.
    assert_eq!(Instant::now() - start, Duration::from_millis(1600));

    let (selection, context) = push_body(&env);
    assert_eq!(selection, "");
    assert_eq!(
        context,
        "message 3\n\nmessage 4\n\nmessage 5\n\nmessage 6\n\nmessage 7\n\nmessage 8"
    );
    assert_eq!(env.provider, Some(Provider::Claude));
    assert!(env.tab_ref.is_empty());
    assert_eq!(env.meta["lang"], "en");
    assert_eq!(env.meta["tabTitle"], "T");

    expect_silence(&mut h.outbound).await;
}

#[tokio::test(start_paused = true)]
async fn test_irrelevant_mutations_do_not_capture() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "hello");
    let mut h = spawn_agent(page, settings(), 8);
    h.outbound.recv().await.unwrap();

    h.events
        .send(PageEvent::Mutations(vec![NodeSnapshot::new("span")]))
        .await
        .unwrap();
    expect_silence(&mut h.outbound).await;
}

#[tokio::test(start_paused = true)]
async fn test_selection_change_captures_immediately() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "context line");
    let mut h = spawn_agent(page, settings(), 8);
    h.outbound.recv().await.unwrap();

    let start = Instant::now();
    h.events
        .send(PageEvent::SelectionChanged("   ".into()))
        .await
        .unwrap();
    h.events
        .send(PageEvent::SelectionChanged("  picked text ".into()))
        .await
        .unwrap();

    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(Instant::now(), start);
    assert_eq!(push_body(&env), ("picked text", "context line"));
    expect_silence(&mut h.outbound).await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_page_without_selection_emits_nothing() {
    let mut h = spawn_agent(claude_page(), settings(), 8);
    h.outbound.recv().await.unwrap();

    h.events.send(PageEvent::CaptureRequested).await.unwrap();
    expect_silence(&mut h.outbound).await;
}

#[tokio::test(start_paused = true)]
async fn test_initial_capture_fires_after_delay() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "first");
    let mut settings = settings();
    settings.initial_capture_delay = Some(Duration::from_millis(2000));

    let start = Instant::now();
    let mut h = spawn_agent(page, settings, 8);
    h.outbound.recv().await.unwrap();

    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(Instant::now() - start, Duration::from_millis(2000));
    assert_eq!(push_body(&env).1, "first");
}

#[tokio::test(start_paused = true)]
async fn test_shortcuts_trigger_captures() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "ctx");
    let mut h = spawn_agent(page, settings(), 8);
    h.outbound.recv().await.unwrap();

    // Alt+M without a selection does nothing.
    h.events
        .send(PageEvent::KeyDown { alt: true, key: "m".into() })
        .await
        .unwrap();
    h.events
        .send(PageEvent::KeyDown { alt: true, key: "r".into() })
        .await
        .unwrap();
    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(push_body(&env), ("", "ctx"));

    h.events
        .send(PageEvent::SelectionChanged("sel".into()))
        .await
        .unwrap();
    expect_capture(&mut h.outbound).await;
    h.events
        .send(PageEvent::KeyDown { alt: true, key: "m".into() })
        .await
        .unwrap();
    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(push_body(&env), ("sel", "ctx"));
}

#[tokio::test(start_paused = true)]
async fn test_capture_meta_reports_model_and_language() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "ctx");
    page.set_lang("de");
    page.set_model("claude-sonnet");
    let mut h = spawn_agent(page, settings(), 8);
    h.outbound.recv().await.unwrap();

    h.events.send(PageEvent::CaptureRequested).await.unwrap();
    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(env.meta["lang"], "de");
    assert_eq!(env.meta["model"], "claude-sonnet");
}

#[tokio::test(start_paused = true)]
async fn test_mutations_during_capture_are_ignored() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "ctx");
    // Capacity 1: the unread registration blocks the next submission.
    let mut h = spawn_agent(page, settings(), 1);

    h.events.send(PageEvent::CaptureRequested).await.unwrap();
    h.events
        .send(PageEvent::Mutations(vec![message_node()]))
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;

    assert!(matches!(
        h.outbound.recv().await,
        Some(AgentMessage::RegisterTab(_))
    ));
    expect_capture(&mut h.outbound).await;
    expect_silence(&mut h.outbound).await;
}

#[tokio::test(start_paused = true)]
async fn test_selection_during_capture_is_replayed() {
    let page = claude_page();
    page.add_message(CLAUDE_MESSAGE, "ctx");
    let mut h = spawn_agent(page, settings(), 1);

    h.events.send(PageEvent::CaptureRequested).await.unwrap();
    h.events
        .send(PageEvent::SelectionChanged("later".into()))
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;

    h.outbound.recv().await.unwrap();
    assert_eq!(push_body(&expect_capture(&mut h.outbound).await), ("", "ctx"));
    assert_eq!(
        push_body(&expect_capture(&mut h.outbound).await),
        ("later", "ctx")
    );
}

#[tokio::test(start_paused = true)]
async fn test_inbound_operations_apply_in_order() {
    let page = claude_page();
    let input = page.add_element(&["textarea"], ElementKind::Value, "");
    let mut h = spawn_agent(page.clone(), settings(), 8);
    h.outbound.recv().await.unwrap();

    h.inbound
        .send(Envelope::command(
            "1",
            chatbridge_protocol::CommandBody {
                action: "replace".into(),
                text: Some("Hello".into()),
                selector: None,
            },
        ))
        .await
        .unwrap();
    for delta in [",", " world", "!"] {
        h.inbound.send(Envelope::stream("1", delta)).await.unwrap();
    }
    sleep(Duration::from_millis(10)).await;

    assert_eq!(page.content_of(input).as_deref(), Some("Hello, world!"));
}

#[tokio::test(start_paused = true)]
async fn test_generic_page_registers_without_provider_and_ignores_mutations() {
    let page = MemoryPage::new("https://example.com/article", "Example");
    page.add_message(CLAUDE_MESSAGE, "not a chat");
    let mut h = spawn_agent(page, settings(), 8);

    match h.outbound.recv().await {
        Some(AgentMessage::RegisterTab(reg)) => assert_eq!(reg.provider, None),
        other => panic!("expected registration, got {:?}", other),
    }

    h.events
        .send(PageEvent::Mutations(vec![message_node()]))
        .await
        .unwrap();
    expect_silence(&mut h.outbound).await;

    // Selections are still captured on unknown sites.
    h.events
        .send(PageEvent::SelectionChanged("quote".into()))
        .await
        .unwrap();
    let env = expect_capture(&mut h.outbound).await;
    assert_eq!(env.provider, None);
    assert_eq!(push_body(&env), ("quote", ""));
}
