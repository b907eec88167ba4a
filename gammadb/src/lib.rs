pub mod data {
    pub mod handle;
    pub mod spectrum_io;
}
