use crate::FieldValues;

// Shares `#[traced_test]`'s one-time global subscriber setup so both test
// logging paths coexist; installing a second global subscriber makes
// `#[traced_test]` panic depending on test order.
static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    tracing_test::internal::INITIALIZED.call_once(|| {
        let mock_writer = tracing_test::internal::MockWriter::new(tracing_test::internal::global_buf());
        let subscriber = tracing_test::internal::get_subscriber(mock_writer, "cfgmgr=trace");
        let _ = tracing::dispatcher::set_global_default(subscriber);
    });
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub fn fields(pairs: &[(&str, &str)]) -> FieldValues {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
