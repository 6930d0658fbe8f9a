// tests/config_env.rs
// Mutates process env, so every test is #[serial].

use std::env;

use serial_test::serial;

/// Small RAII helper to snapshot & restore env vars in each test.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}
impl EnvSnapshot {
    /// Provide a list of (KEY, Some(VALUE)) to set, or (KEY, None) to remove.
    fn set(pairs: &[(&str, Option<&str>)]) -> Self {
        let mut saved = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let key = k.to_string();
            saved.push((key.clone(), env::var(k).ok()));
            match v {
                Some(val) => env::set_var(&key, val),
                None => env::remove_var(&key),
            }
        }
        Self { saved }
    }
}
impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, maybe_v) in self.saved.drain(..) {
            match maybe_v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

#[tokio::test]
#[serial]
async fn missing_api_key_is_fatal_at_startup() {
    let _env = EnvSnapshot::set(&[
        ("GEMINI_API_KEY", None),
        ("AI_TEST_MODE", None),
        ("AI_PROVIDER", None),
    ]);
    let err = review_sentiment_desk::app()
        .await
        .expect_err("startup must fail without GEMINI_API_KEY");
    assert!(err.to_string().contains("GEMINI_API_KEY"), "{err}");
}

#[tokio::test]
#[serial]
async fn api_key_present_starts() {
    let _env = EnvSnapshot::set(&[
        ("GEMINI_API_KEY", Some("test-key")),
        ("AI_TEST_MODE", None),
        ("CLASSIFIER_URL", None),
        ("KNOWLEDGE_BASE_PATH", None),
    ]);
    assert!(review_sentiment_desk::app().await.is_ok());
}

#[tokio::test]
#[serial]
async fn test_mode_starts_without_key() {
    let _env = EnvSnapshot::set(&[("GEMINI_API_KEY", None), ("AI_TEST_MODE", Some("error"))]);
    assert!(review_sentiment_desk::app().await.is_ok());
}

#[tokio::test]
#[serial]
async fn malformed_knowledge_base_is_fatal() {
    let path = env::temp_dir().join(format!("bad_kb_{}.toml", std::process::id()));
    std::fs::write(&path, "topics = [1, 2").unwrap();
    let path_str = path.to_string_lossy().to_string();
    let _env = EnvSnapshot::set(&[
        ("AI_TEST_MODE", Some("mock")),
        ("KNOWLEDGE_BASE_PATH", Some(path_str.as_str())),
    ]);
    let err = review_sentiment_desk::app().await.expect_err("bad KB must fail");
    assert!(format!("{err:#}").contains("parsing"), "{err:#}");
    let _ = std::fs::remove_file(path);
}
