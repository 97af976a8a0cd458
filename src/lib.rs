pub mod error;

pub mod base {
    pub mod address;
    pub mod command;
    pub mod response;
}

pub mod foxtron {
    pub mod frame;
    pub mod master;
    #[cfg(feature = "serial_driver")]
    pub mod serial;
    pub mod transport;
}

pub mod utils {
    pub mod commissioning;
    pub mod dyn_future;
}
