use crate::error::ClientError;

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 交给界面层展示的一条提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&ClientError> for Notice {
    fn from(err: &ClientError) -> Self {
        Notice::error(err.user_message())
    }
}

/// 宿主界面接口：提示、整页重载、打开第三方登录窗口
pub trait ClientHost: Send + Sync {
    fn notify(&self, notice: &Notice);

    /// 让依赖会话的界面重新读取 SessionStore
    fn reload(&self);

    fn open_surface(&self, url: &str) -> Result<(), String>;
}

/// 命令行宿主，提示写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHost;

impl ClientHost for ConsoleHost {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!("{}", notice.message),
            NoticeLevel::Warning => tracing::warn!("{}", notice.message),
            NoticeLevel::Error => tracing::error!("{}", notice.message),
        }
    }

    fn reload(&self) {
        tracing::info!("Session changed, reloading views");
    }

    fn open_surface(&self, url: &str) -> Result<(), String> {
        println!("Open this URL in your browser to continue: {}", url);
        Ok(())
    }
}
