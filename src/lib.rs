use std::sync::Once;

pub mod cache;
pub mod ir;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::init();
    });
}
