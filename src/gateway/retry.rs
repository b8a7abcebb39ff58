//! レート制限時の再試行
//!
//! 待ち時間の計算（`retry_delay`）と再試行ループ（`with_retry`）を分けてあり、
//! どちらも実時間なしでテストできる。

use super::ExtractError;
use crate::ai_provider::ProviderKind;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 初回の後に許す再試行回数
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Retry-After が日時のときの最小待ち時間
    pub min_retry_after_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            min_retry_after_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// 指数バックオフ: min(2^attempt 秒, 上限)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// 次の試行までの待ち時間
///
/// `attempt` は 0 始まりの再試行番号。Retry-After は秒数か HTTP 日付。
/// どちらとも読めなければ指数バックオフ。
pub fn retry_delay(policy: &RetryPolicy, attempt: u32, retry_after: Option<&str>, now: DateTime<Utc>) -> Duration {
    let Some(value) = retry_after.map(str::trim).filter(|v| !v.is_empty()) else {
        return policy.backoff(attempt);
    };

    if value.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(seconds) = value.parse::<u64>() {
            return Duration::from_millis(seconds.saturating_mul(1000));
        }
    }

    match DateTime::parse_from_rfc2822(value) {
        Ok(date) => {
            let delta = date.with_timezone(&Utc).signed_duration_since(now).num_milliseconds();
            let ms = delta.max(policy.min_retry_after_ms as i64) as u64;
            Duration::from_millis(ms)
        }
        Err(_) => policy.backoff(attempt),
    }
}

/// 1回の試行結果
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    /// 429 応答（Retry-After ヘッダの値）
    RateLimited { retry_after: Option<String> },
}

/// レート制限のあいだ試行を繰り返す
///
/// `op` には 0 始まりの試行番号が渡る。レート制限以外のエラーは即座に返す。
/// `sleep` を差し替えればテストで実際に待たない。
pub async fn with_retry<T, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    provider: ProviderKind,
    mut op: Op,
    mut sleep: Sleep,
) -> Result<T, ExtractError>
where
    Op: FnMut(u32) -> OpFut,
    OpFut: Future<Output = Result<Attempt<T>, ExtractError>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await? {
            Attempt::Done(value) => return Ok(value),
            Attempt::RateLimited { retry_after } => {
                if attempt >= policy.max_retries {
                    warn!(provider = %provider, attempts = attempt + 1, "rate limit retries exhausted");
                    return Err(ExtractError::RateLimited {
                        provider,
                        attempts: attempt + 1,
                    });
                }
                let delay = retry_delay(policy, attempt, retry_after.as_deref(), Utc::now());
                warn!(
                    provider = %provider,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
