#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastKind {
    #[default]
    Success,
    Error,
}

/// The one transient notice the app can show at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Toast {
    pub visible: bool,
    pub message: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            visible: true,
            message: message.into(),
            kind: ToastKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            visible: true,
            message: message.into(),
            kind: ToastKind::Error,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.kind {
            ToastKind::Success => "✅",
            ToastKind::Error => "⚠️",
        }
    }
}
