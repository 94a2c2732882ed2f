use super::*;

const LIMIT: usize = 3;
const WINDOW: Duration = Duration::from_secs(600);

fn limiter() -> RateLimiter {
    RateLimiter::new(LIMIT, WINDOW)
}

#[test]
fn allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..LIMIT {
        assert!(rl.check_and_record_at("a@quarry.example", now).is_ok(), "request {i} should succeed");
    }
    assert_eq!(
        rl.check_and_record_at("a@quarry.example", now),
        Err(RateLimitError { limit: LIMIT, window_secs: 600 })
    );
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..LIMIT {
        rl.check_and_record_at("a@quarry.example", start).unwrap();
    }
    assert!(rl.check_and_record_at("a@quarry.example", start).is_err());

    let after_window = start + WINDOW + Duration::from_millis(1);
    assert!(rl.check_and_record_at("a@quarry.example", after_window).is_ok());
}

#[test]
fn distinct_keys_do_not_interfere() {
    let rl = limiter();
    let now = Instant::now();

    for _ in 0..LIMIT {
        rl.check_and_record_at("a@quarry.example", now).unwrap();
    }
    assert!(rl.check_and_record_at("a@quarry.example", now).is_err());
    assert!(rl.check_and_record_at("b@quarry.example", now).is_ok());
}

#[test]
fn rejected_requests_are_not_recorded() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..LIMIT {
        rl.check_and_record_at("a@quarry.example", start).unwrap();
    }
    // Hammering while limited must not extend the lockout.
    let mid = start + Duration::from_secs(300);
    for _ in 0..10 {
        assert!(rl.check_and_record_at("a@quarry.example", mid).is_err());
    }
    let after_window = start + WINDOW + Duration::from_millis(1);
    assert!(rl.check_and_record_at("a@quarry.example", after_window).is_ok());
}

#[test]
fn expired_keys_are_dropped() {
    let rl = limiter();
    let start = Instant::now();
    rl.check_and_record_at("a@quarry.example", start).unwrap();
    rl.check_and_record_at("b@quarry.example", start).unwrap();
    assert_eq!(rl.tracked_keys(), 2);

    let later = start + WINDOW + Duration::from_secs(1);
    rl.check_and_record_at("c@quarry.example", later).unwrap();
    assert_eq!(rl.tracked_keys(), 1);
}

#[test]
fn clones_share_state() {
    let rl = limiter();
    let other = rl.clone();
    let now = Instant::now();
    for _ in 0..LIMIT {
        rl.check_and_record_at("a@quarry.example", now).unwrap();
    }
    assert!(other.check_and_record_at("a@quarry.example", now).is_err());
}

#[test]
fn error_code_is_rate_limited() {
    let err = RateLimitError { limit: 1, window_secs: 60 };
    assert_eq!(err.error_code(), "E_RATE_LIMITED");
    assert_eq!(err.to_string(), "too many requests (max 1 per 60s)");
}
