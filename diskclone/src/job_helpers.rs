fn build_client(
    base_url: Option<&str>,
    token: &str,
) -> Result<YadiskClient, diskclone_core::YadiskError> {
    match base_url {
        Some(url) => YadiskClient::with_base_url(url, token.to_string()),
        None => YadiskClient::new(token.to_string()),
    }
}

fn retry_policy(max_retries: u64, max_backoff_ms: u64) -> RetryPolicy {
    RetryPolicy::new(
        u32::try_from(max_retries).unwrap_or(u32::MAX),
        Backoff::new(
            Duration::from_secs(1),
            Duration::from_millis(max_backoff_ms),
            Duration::from_secs(1),
        ),
    )
}

fn delay_until(run_at: OffsetDateTime, now: OffsetDateTime) -> Duration {
    Duration::try_from(run_at - now).unwrap_or(Duration::ZERO)
}

fn done_label(done: bool) -> &'static str {
    if done { "done" } else { "pending" }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_string_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Like [`read_u64_env`], but zero is a meaningful value.
fn read_count_env(name: &str, default: u64) -> u64 {
    parse_count(std::env::var(name).ok().as_deref(), default)
}

fn parse_count(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
