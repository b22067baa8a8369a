// Askama template definitions

use askama::Template;

use super::PageContext;
use crate::db::users::UserStats;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub page: PageContext,
}

// Login template
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    /// Echoed back after a failed attempt
    pub email: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub email: String,
}

#[derive(Template)]
#[template(path = "activate.html")]
pub struct ActivateTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "resend_activation.html")]
pub struct ResendActivationTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "reset_password.html")]
pub struct ResetPasswordTemplate {
    pub page: PageContext,
    pub token: String,
}

// Admin overview
#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub page: PageContext,
    pub stats: UserStats,
    pub active_sessions: i64,
    pub email: String,
    pub roles: String,
}

pub struct LevelOption {
    pub name: &'static str,
    pub selected: bool,
}

// Runtime configuration form
#[derive(Template)]
#[template(path = "config.html")]
pub struct ConfigTemplate {
    pub page: PageContext,
    pub base_url: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// Whether a password is stored; the value itself is never rendered
    pub smtp_password_set: bool,
    pub from_address: String,
    pub from_name: String,
    pub requests_per_minute: u32,
    pub log_levels: Vec<LevelOption>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub page: PageContext,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub page: PageContext,
}
