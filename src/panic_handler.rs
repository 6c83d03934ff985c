use std::panic;

use log::error;

/// Install a readable backtrace printer and make sure panics also land in
/// the log file, which is often the only record when running headless.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}
