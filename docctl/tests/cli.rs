use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const VALID_FRONTMATTER: &str = "title: Intake\ndoc_uid: MOS-ENG-SOP-001\norg: MOS\ndepartment: ENG\ncategory: SOP\nnotion:\n  publish: true\n  database: Documents\nlifecycle:\n  desired_state: draft\naccess_groups:\n  - eng\n";

/// Creates a repository with one document under docs/SOP.
fn create_repo(frontmatter: &str) -> TempDir {
    let dir = tempdir().expect("Creating temp repo failed");
    let sop = dir.path().join("docs").join("SOP");
    fs::create_dir_all(&sop).expect("Creating docs dir failed");
    fs::write(
        sop.join("intake.md"),
        format!("---\n{frontmatter}---\n# Intake\n\nSteps.\n"),
    )
    .expect("Writing document failed");
    dir
}

fn docctl(repo: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docctl").expect("Binary exists");
    cmd.current_dir(repo)
        .env_remove("GITHUB_WORKSPACE")
        .env_remove("NOTION_TOKEN")
        .env_remove("NOTION_DATABASE_ID_DOCUMENTS");
    cmd
}

#[test]
fn validate_passes_for_complete_document() {
    let repo = create_repo(VALID_FRONTMATTER);
    docctl(repo.path())
        .arg("validate")
        .arg("--repo-root")
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed: 0 errors"));
}

#[test]
fn validate_fails_and_lists_errors() {
    let repo = create_repo(&VALID_FRONTMATTER.replace("title: Intake\n", ""));
    docctl(repo.path())
        .arg("validate")
        .arg("--repo-root")
        .arg(repo.path())
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("ERROR:")
                .and(predicate::str::contains("missing required field 'title'"))
                .and(predicate::str::contains("Validation failed")),
        );
}

#[test]
fn validate_defaults_to_working_directory() {
    let repo = create_repo(VALID_FRONTMATTER);
    docctl(repo.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed"));
}

#[test]
fn publish_requires_notion_token() {
    let repo = create_repo(VALID_FRONTMATTER);
    docctl(repo.path())
        .args(["publish", "--mode", "draft", "--repo-root"])
        .arg(repo.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOTION_TOKEN"));
}

#[test]
fn publish_rejects_unknown_mode() {
    let repo = create_repo(VALID_FRONTMATTER);
    docctl(repo.path())
        .args(["publish", "--mode", "final"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--mode"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use docctl::cli::{run, Cli, Commands, Outcome};

    let repo = create_repo(VALID_FRONTMATTER);
    let cli = Cli {
        command: Commands::Validate {
            repo_root: Some(repo.path().to_path_buf()),
            files: Vec::new(),
        },
    };

    let outcome = run(cli).await.expect("validate runs");
    assert_eq!(outcome, Outcome::Success);

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
