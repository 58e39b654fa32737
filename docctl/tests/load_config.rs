use docctl::load_config::load_config;
use serial_test::serial;
use std::env;
use tempfile::tempdir;

const VARS: [&str; 12] = [
    "GITHUB_WORKSPACE",
    "NOTION_TOKEN",
    "NOTION_DATABASE_ID_DOCUMENTS",
    "GITEA_URL",
    "GITHUB_REPOSITORY_OWNER",
    "GITHUB_REPOSITORY",
    "GITHUB_SHA",
    "GITHUB_REF_NAME",
    "PR_NUMBER",
    "PR_URL",
    "GITHUB_ACTOR",
    "BOT_COMMIT_AUTHOR",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn reads_ci_metadata_from_environment() {
    clear_env();
    let repo = tempdir().expect("temp dir");
    env::set_var("NOTION_TOKEN", "secret-token");
    env::set_var("NOTION_DATABASE_ID_DOCUMENTS", "db-123");
    env::set_var("GITEA_URL", "https://git.example.com");
    env::set_var("GITHUB_REPOSITORY_OWNER", "org");
    env::set_var("GITHUB_REPOSITORY", "org/docs");
    env::set_var("GITHUB_SHA", "abc123");
    env::set_var("GITHUB_REF_NAME", "main");
    env::set_var("PR_NUMBER", "17");
    env::set_var("GITHUB_ACTOR", "alice");

    let config = load_config(Some(repo.path().to_path_buf())).expect("Config should load");
    let pipeline = &config.pipeline;

    assert_eq!(pipeline.repo_root, repo.path());
    assert_eq!(pipeline.docs_dir, repo.path().join("docs"));
    assert_eq!(pipeline.database_id, "db-123");
    assert_eq!(pipeline.repo_owner, "org");
    assert_eq!(pipeline.repo_name, "docs");
    assert_eq!(pipeline.commit_sha, "abc123");
    assert_eq!(pipeline.branch, "main");
    assert_eq!(pipeline.pr_number, "17");
    assert_eq!(pipeline.actor, "alice");
    assert_eq!(pipeline.bot_author, "docctl-bot");
    assert_eq!(
        config.store_credentials().expect("credentials present"),
        ("secret-token", "db-123")
    );
    clear_env();
}

#[test]
#[serial]
fn workspace_variable_sets_repo_root() {
    clear_env();
    let repo = tempdir().expect("temp dir");
    env::set_var("GITHUB_WORKSPACE", repo.path());
    env::set_var("BOT_COMMIT_AUTHOR", "release-bot");

    let config = load_config(None).expect("Config should load");
    assert_eq!(config.pipeline.repo_root, repo.path());
    assert_eq!(config.pipeline.bot_author, "release-bot");
    clear_env();
}

#[test]
#[serial]
fn missing_credentials_are_reported_by_name() {
    clear_env();
    let repo = tempdir().expect("temp dir");

    let config = load_config(Some(repo.path().to_path_buf())).expect("Config should load");
    let err = config.store_credentials().unwrap_err();
    assert!(err.to_string().contains("NOTION_TOKEN"), "{err}");

    env::set_var("NOTION_TOKEN", "secret-token");
    let config = load_config(Some(repo.path().to_path_buf())).expect("Config should load");
    let err = config.store_credentials().unwrap_err();
    assert!(err.to_string().contains("NOTION_DATABASE_ID_DOCUMENTS"), "{err}");
    clear_env();
}

#[test]
#[serial]
fn missing_repo_root_is_an_error() {
    clear_env();
    let repo = tempdir().expect("temp dir");
    let missing = repo.path().join("nope");
    assert!(load_config(Some(missing)).is_err());
}
