use clap::{Arg, Command};

pub const ARG_MAIL_RELAY_URL: &str = "mail-relay-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_RELAY_URL)
                .long("mail-relay-url")
                .help("Mail relay endpoint; when unset, messages are logged instead of delivered")
                .env("EINLASS_MAIL_RELAY_URL"),
        )
        .arg(
            Arg::new("notify-queue-capacity")
                .long("notify-queue-capacity")
                .help("Bounded notification queue capacity")
                .env("EINLASS_NOTIFY_QUEUE_CAPACITY")
                .default_value("256")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("notify-max-attempts")
                .long("notify-max-attempts")
                .help("Max delivery attempts before dropping a notification")
                .env("EINLASS_NOTIFY_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("notify-backoff-base-seconds")
                .long("notify-backoff-base-seconds")
                .help("Base delay for notification retry backoff")
                .env("EINLASS_NOTIFY_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("notify-backoff-max-seconds")
                .long("notify-backoff-max-seconds")
                .help("Max delay for notification retry backoff")
                .env("EINLASS_NOTIFY_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
