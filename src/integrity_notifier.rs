use crate::email_client::EmailClient;
use once_cell::sync::Lazy;

static DATA_INTEGRITY_NOTIFIER: Lazy<DataIntegrityNotifier> = Lazy::new(DataIntegrityNotifier::new);

pub fn notify_data_integrity(context: &str, detail: &str) {
    DATA_INTEGRITY_NOTIFIER.notify(context, detail);
}

struct DataIntegrityNotifier {
    agent_name: String,
}

impl DataIntegrityNotifier {
    fn new() -> Self {
        let agent_name = std::env::var("LADDER_AGENT").unwrap_or_default();
        Self { agent_name }
    }

    fn notify(&self, context: &str, detail: &str) {
        let subject = if self.agent_name.is_empty() {
            format!("[DataIntegrity] {}", context)
        } else {
            format!("[{}] Data integrity - {}", self.agent_name, context)
        };
        let body = format!(
            "A daily primary point arrived without its same-day secondary counterpart while {}.\nDetail: {}",
            context, detail
        );

        EmailClient::new().send(&subject, &body);
        log::warn!(
            "📧 [DataIntegrity] Email notification sent for '{}' (detail: {})",
            context,
            detail
        );
    }
}
