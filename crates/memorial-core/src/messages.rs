//! Bilingual text for notifications and session errors.
//!
//! Vietnamese is the default; English is available through config.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vi" | "vi-vn" | "vietnamese" | "tiếng việt" => Some(Locale::Vi),
            "en" | "en-us" | "en-gb" | "english" => Some(Locale::En),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::Vi => f.write_str("vi"),
            Locale::En => f.write_str("en"),
        }
    }
}

/// Every piece of text the core shows to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    WelcomeBack { first_name: &'a str },
    Registered { first_name: &'a str },
    LoginFailed,
    RegisterFailed,
    LoggedOut,
    LoadUserFailed,
    ProfileUpdated,
    ProfileUpdateFailed,
    PasswordChanged,
    PasswordChangeFailed,
    AccountDeleted,
    AccountDeleteFailed,
    CachedOffline,
    SessionExpired,
}

impl Message<'_> {
    pub fn text(&self, locale: Locale) -> String {
        match locale {
            Locale::Vi => self.vietnamese(),
            Locale::En => self.english(),
        }
    }

    fn vietnamese(&self) -> String {
        match self {
            Message::WelcomeBack { first_name } => format!("Chào mừng trở lại, {}!", first_name),
            Message::Registered { first_name } => {
                format!("Đăng ký thành công! Chào mừng {}!", first_name)
            }
            Message::LoginFailed => "Đăng nhập thất bại".to_string(),
            Message::RegisterFailed => "Đăng ký thất bại".to_string(),
            Message::LoggedOut => "Đã đăng xuất thành công".to_string(),
            Message::LoadUserFailed => "Không thể tải thông tin người dùng".to_string(),
            Message::ProfileUpdated => "Cập nhật thông tin thành công!".to_string(),
            Message::ProfileUpdateFailed => "Cập nhật thông tin thất bại".to_string(),
            Message::PasswordChanged => "Đổi mật khẩu thành công!".to_string(),
            Message::PasswordChangeFailed => "Đổi mật khẩu thất bại".to_string(),
            Message::AccountDeleted => "Đã xóa tài khoản".to_string(),
            Message::AccountDeleteFailed => "Xóa tài khoản thất bại".to_string(),
            Message::CachedOffline => {
                "Đang dùng thông tin đăng nhập đã lưu (ngoại tuyến)".to_string()
            }
            Message::SessionExpired => {
                "Phiên đăng nhập đã hết hạn, vui lòng đăng nhập lại".to_string()
            }
        }
    }

    fn english(&self) -> String {
        match self {
            Message::WelcomeBack { first_name } => format!("Welcome back, {}!", first_name),
            Message::Registered { first_name } => {
                format!("Registration successful! Welcome {}!", first_name)
            }
            Message::LoginFailed => "Login failed".to_string(),
            Message::RegisterFailed => "Registration failed".to_string(),
            Message::LoggedOut => "Signed out successfully".to_string(),
            Message::LoadUserFailed => "Could not load user information".to_string(),
            Message::ProfileUpdated => "Profile updated!".to_string(),
            Message::ProfileUpdateFailed => "Profile update failed".to_string(),
            Message::PasswordChanged => "Password changed!".to_string(),
            Message::PasswordChangeFailed => "Password change failed".to_string(),
            Message::AccountDeleted => "Account deleted".to_string(),
            Message::AccountDeleteFailed => "Account deletion failed".to_string(),
            Message::CachedOffline => "Using cached authentication (offline)".to_string(),
            Message::SessionExpired => "Your session has expired, please sign in again".to_string(),
        }
    }
}
