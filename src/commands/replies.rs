//! Fixed reply texts. Command names are rendered with the configured prefix.

pub const PONG: &str = "pong";
pub const ENABLED: &str = "Enabled saving messages";
pub const ALREADY_ENABLED: &str = "Saving messages already enabled";
pub const DISABLED: &str = "Disabled saving messages";
pub const ALREADY_DISABLED: &str = "Saving messages already disabled";
pub const TIMEOUT_CHANGED: &str = "Timeout changed";
pub const FAREWELL: &str = "Goodbye!";

pub fn help_text(prefix: &str) -> String {
    format!(
        "Supported commands:\n\
         {p}help -- print this message\n\
         {p}on -- the bot will delete outdated messages\n\
         {p}off -- the bot will be disabled\n\
         {p}timeout -- new timeout after which the messages will be deleted\n\
         {p}delete -- delete all messages\n\
         {p}setting -- print current settings\n\
         {p}stop -- !!! delete all messages, delete settings and stop the bot !!!\n\
         \n\
         Timeout format:\n\
         Timeout is set in the format: <decimal><unit suffix>\n\
         unit suffix one of \"s\", \"m\", \"h\"\n\
         Example: 1h15m, 24h, 30m, 60s, 10h30m15s",
        p = prefix
    )
}

pub fn start_text(prefix: &str) -> String {
    format!(
        "Instructions to get started:\n\
         1. Add the bot to your server\n\
         2. Give it the Manage Messages permission in the channel\n\
         3. In the channel send {p}on to start\n\
         4. You can change the timeout with {p}timeout\n\
         5. To get the list of commands send {p}help",
        p = prefix
    )
}

pub fn created(timeout: &str) -> String {
    format!("Created new configuration, default message timeout {timeout}")
}

pub fn invalid_timeout(reason: &str, prefix: &str) -> String {
    format!("Error! Invalid new timeout value: {reason}. Send a {prefix}help command to get help")
}

pub fn timeout_rejected(reason: &str) -> String {
    format!("Unable to set timeout! {reason}")
}

pub fn unknown_command(prefix: &str) -> String {
    format!("Unknown command. Please send '{prefix}help' for all possible commands.")
}
