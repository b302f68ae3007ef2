use super::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self::at(message, Utc::now())
    }

    pub fn at<S: Into<String>>(message: S, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }
}

/// Automation attached to one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// serialized visual program
    pub xml: String,
    /// compiled script
    pub js: String,
    pub error_report: Option<ErrorReport>,
    pub editable: bool,
    pub dry_run: bool,
}

impl Function {
    pub fn new<X: Into<String>, J: Into<String>>(xml: X, js: J) -> Self {
        Self {
            xml: xml.into(),
            js: js.into(),
            error_report: None,
            editable: true,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn record_error<S: Into<String>>(&mut self, message: S) -> &ErrorReport {
        self.error_report.insert(ErrorReport::new(message))
    }

    /// Drops an error report older than `retention`, returns whether it did.
    pub fn clear_stale_error(
        &mut self,
        now: DateTime<Utc>,
        retention: std::time::Duration,
    ) -> bool {
        let stale = self.error_report.as_ref().is_some_and(|report| {
            now.signed_duration_since(report.timestamp)
                .to_std()
                .is_ok_and(|age| age > retention)
        });
        if stale {
            self.error_report = None;
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_errors_are_cleared() {
        let now = Utc::now();
        let retention = std::time::Duration::from_secs(3600);

        let mut function = Function::new("<xml/>", "");
        function.error_report = Some(ErrorReport::at("boom", now - Duration::seconds(10)));
        assert!(!function.clear_stale_error(now, retention));
        assert!(function.error_report.is_some());

        function.error_report = Some(ErrorReport::at("boom", now - Duration::seconds(3601)));
        assert!(function.clear_stale_error(now, retention));
        assert!(function.error_report.is_none());

        assert!(!function.clear_stale_error(now, retention));
    }
}
