use estafeta::Config;

fn full_config() -> Config {
    toml::from_str(
        r#"
        [build]
        repository = "gcr.io/my-project/selina-bot"
        publisher = "cloud-build"
        context = "."

        [deploy]
        platform = "cloud-run"
        project = "my-project"
        region = "europe-west1"
        service = "selina-bot"
        memory = "512Mi"
        cpu = "1"
        max_instances = 3

        [deploy.env]
        TELEGRAM_WEBHOOK_MODE = "true"

        [verify]
        probe_path = "/healthz"
        interval_secs = 2
        max_attempts = 5

        [webhook]
        path = "/webhook/telegram"
        allowed_updates = ["message", "callback_query", "inline_query"]
        drop_pending = true
        "#,
    )
    .unwrap()
}

#[test]
fn full_file_parses() {
    let config = full_config();

    assert_eq!(config.build.repository, "gcr.io/my-project/selina-bot");
    assert_eq!(config.deploy.platform, "cloud-run");
    assert_eq!(config.deploy.service, "selina-bot");
    assert_eq!(config.verify.max_attempts, 5);
    assert_eq!(
        config.webhook.allowed_updates,
        vec!["message", "callback_query", "inline_query"]
    );
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let config: Config = toml::from_str(
        r#"
        [deploy]
        project = "my-project"
        region = "europe-west1"
        service = "selina-bot"
        "#,
    )
    .unwrap();

    assert_eq!(config.build.publisher, "cloud-build");
    assert_eq!(config.deploy.platform, "cloud-run");
    assert_eq!(config.deploy.concurrency, 80);
    assert_eq!(config.deploy.ready_wait_secs, 300);
    assert_eq!(config.verify.probe_path, "/healthz");
    assert_eq!(config.verify.interval_secs, 2);
    assert_eq!(config.verify.max_attempts, 5);
    assert_eq!(config.webhook.path, "/webhook/telegram");
    assert!(config.webhook.drop_pending);
    assert_eq!(
        config.webhook.allowed_updates,
        vec!["message", "callback_query", "inline_query"]
    );
}

#[test]
fn overrides_beat_file_values() {
    let mut config = full_config();

    config
        .apply_overrides(|key| match key {
            "ESTAFETA_REGION" => Some("us-central1".to_string()),
            "ESTAFETA_MAX_ATTEMPTS" => Some("9".to_string()),
            "ESTAFETA_ALLOWED_UPDATES" => Some("message, edited_message".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.deploy.region, "us-central1");
    assert_eq!(config.verify.max_attempts, 9);
    assert_eq!(
        config.webhook.allowed_updates,
        vec!["message", "edited_message"]
    );
    // Untouched keys keep their file values.
    assert_eq!(config.deploy.project, "my-project");
}

#[test]
fn numeric_override_must_parse() {
    let mut config = full_config();

    let result = config.apply_overrides(|key| {
        (key == "ESTAFETA_INTERVAL_SECS").then(|| "soon".to_string())
    });

    let err = result.unwrap_err();
    assert!(err.to_string().contains("ESTAFETA_INTERVAL_SECS"));
}

#[test]
fn target_requires_the_full_triple() {
    let mut config = full_config();
    let target = config.target().unwrap();
    assert_eq!(target.project, "my-project");
    assert_eq!(target.lock_key(), "selina-bot-europe-west1");

    config.deploy.region.clear();
    let err = config.target().unwrap_err();
    assert!(err.to_string().contains("deploy.region"));
}

#[test]
fn image_gets_a_default_tag() {
    let mut config = full_config();
    assert_eq!(config.image().unwrap(), "gcr.io/my-project/selina-bot:latest");

    config.build.repository = "gcr.io/my-project/selina-bot:v12".to_string();
    assert_eq!(config.image().unwrap(), "gcr.io/my-project/selina-bot:v12");

    // A registry port is not a tag.
    config.build.repository = "registry.local:5000/bots/selina".to_string();
    assert_eq!(
        config.image().unwrap(),
        "registry.local:5000/bots/selina:latest"
    );
}

#[test]
fn image_requires_a_repository() {
    let config = Config::default();

    assert!(config.image().is_err());
}

#[test]
fn service_spec_carries_deploy_values() {
    let spec = full_config().service_spec();

    assert_eq!(spec.memory_or_default(), "512Mi");
    assert_eq!(spec.cpu_or_default(), "1");
    assert_eq!(spec.max_instances, 3);
    assert_eq!(
        spec.env,
        vec![("TELEGRAM_WEBHOOK_MODE".to_string(), "true".to_string())]
    );
}
