//! Login gate with an arithmetic CAPTCHA.
//!
//! Credentials are not verified against anything: any non-empty username and
//! password pair is accepted once the CAPTCHA is answered correctly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::DeskConfig;
use crate::error::{CsrError, Result};
use crate::notify::{Notification, Notifier};

/// Addition challenge with operands in `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captcha {
    a: u32,
    b: u32,
}

impl Captcha {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            a: rng.gen_range(1..=10),
            b: rng.gen_range(1..=10),
        }
    }

    pub fn with_operands(a: u32, b: u32) -> Self {
        Self { a, b }
    }

    pub fn question(&self) -> String {
        format!("{} + {} = ?", self.a, self.b)
    }

    pub fn answer(&self) -> u32 {
        self.a + self.b
    }

    /// Check a typed answer. Surrounding whitespace is ignored.
    pub fn check(&self, answer: &str) -> Result<()> {
        match answer.trim().parse::<i64>() {
            Ok(n) if n == i64::from(self.answer()) => Ok(()),
            _ => Err(CsrError::CaptchaMismatch),
        }
    }
}

/// What the operator typed into the login form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub captcha_answer: String,
}

impl LoginForm {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        captcha_answer: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            captcha_answer: captcha_answer.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

pub struct LoginGate {
    notifier: Notifier,
    captcha: Captcha,
    auth_delay: Duration,
}

impl LoginGate {
    pub fn new(notifier: Notifier, auth_delay: Duration) -> Self {
        Self::with_captcha(notifier, auth_delay, Captcha::generate())
    }

    pub fn with_captcha(notifier: Notifier, auth_delay: Duration, captcha: Captcha) -> Self {
        Self {
            notifier,
            captcha,
            auth_delay,
        }
    }

    pub fn from_config(notifier: Notifier, config: &DeskConfig) -> Self {
        Self::new(notifier, Duration::from_millis(config.auth_delay_ms))
    }

    /// The challenge currently shown on the login form.
    pub fn captcha_question(&self) -> String {
        self.captcha.question()
    }

    /// Replace the challenge with a new one.
    pub fn refresh_captcha(&mut self) {
        self.captcha = Captcha::generate();
    }

    /// Attempt a login.
    ///
    /// Missing credentials are reported before the CAPTCHA is looked at.
    #[tracing::instrument(skip(self, form), fields(username = %form.username))]
    pub async fn login(&self, form: &LoginForm) -> Result<Session> {
        if !self.auth_delay.is_zero() {
            tokio::time::sleep(self.auth_delay).await;
        }

        let outcome = self.check(form);
        match &outcome {
            Ok(_) => {
                tracing::info!("Operator logged in");
                self.notifier
                    .publish(Notification::success("Success", "Login successful!"));
            }
            Err(CsrError::MissingField(_)) => {
                self.notifier
                    .publish(Notification::error("Please fill in all fields"));
            }
            Err(_) => {
                tracing::warn!("Login rejected: incorrect CAPTCHA answer");
                self.notifier
                    .publish(Notification::error("Incorrect CAPTCHA answer"));
            }
        }
        outcome
    }

    fn check(&self, form: &LoginForm) -> Result<Session> {
        if form.username.is_empty() {
            return Err(CsrError::MissingField("username"));
        }
        if form.password.is_empty() {
            return Err(CsrError::MissingField("password"));
        }
        self.captcha.check(&form.captcha_answer)?;

        Ok(Session {
            username: form.username.clone(),
            logged_in_at: Utc::now(),
        })
    }

    /// End a session. The session is consumed so it cannot be reused.
    pub fn logout(&self, session: Session) {
        tracing::info!(username = %session.username, "Operator logged out");
    }
}
