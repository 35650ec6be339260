use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bodies of the built-ins that talk to the device the program runs on.
pub trait Host {
    /// Seconds since the Unix epoch.
    fn now(&mut self) -> i64;
    fn imei(&mut self) -> String;
    fn send_email(&mut self, to: &str, subject: &str, body: &str) -> bool;
    fn send_sms(&mut self, number: &str, text: &str) -> bool;
    fn show_dialog(&mut self, title: &str, message: &str);
    fn show_toast(&mut self, message: &str);
    fn user_id(&mut self) -> String;
    fn var_value(&mut self, name: &str) -> String;
    fn set_var_value(&mut self, name: &str, value: &str);
    fn go_to_route(&mut self, route: &str);
    fn transition(&mut self) -> String;
    fn header(&mut self, name: &str) -> String;
}

/// A host with no device behind it.
///
/// Variables live in memory, messages always succeed and every other action
/// is recorded in `events`.
#[derive(Debug, Clone, Default)]
pub struct StubHost {
    pub vars: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub events: Vec<String>,
}

impl Host for StubHost {
    fn now(&mut self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i64)
    }

    fn imei(&mut self) -> String {
        "000000000000000".to_owned()
    }

    fn send_email(&mut self, to: &str, subject: &str, _body: &str) -> bool {
        self.events.push(format!("email {to}: {subject}"));
        true
    }

    fn send_sms(&mut self, number: &str, text: &str) -> bool {
        self.events.push(format!("sms {number}: {text}"));
        true
    }

    fn show_dialog(&mut self, title: &str, message: &str) {
        self.events.push(format!("dialog {title}: {message}"));
    }

    fn show_toast(&mut self, message: &str) {
        self.events.push(format!("toast {message}"));
    }

    fn user_id(&mut self) -> String {
        String::new()
    }

    fn var_value(&mut self, name: &str) -> String {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    fn set_var_value(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_owned(), value.to_owned());
    }

    fn go_to_route(&mut self, route: &str) {
        self.events.push(format!("route {route}"));
    }

    fn transition(&mut self) -> String {
        String::new()
    }

    fn header(&mut self, name: &str) -> String {
        self.headers.get(name).cloned().unwrap_or_default()
    }
}
