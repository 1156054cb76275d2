mod notifier;

pub use notifier::{Notifier, WebhookNotifier};
