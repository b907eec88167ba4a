// nuclear module
pub mod nuclear {
    pub mod constants;
    pub mod elements;
    pub mod nuclide;
}

// data module
pub mod data {
    pub mod peak;
    pub mod reference;
}

// algorithm module
pub mod algorithm {
    pub mod efficiency;
    pub mod discovery;
    pub mod scoring;
    pub mod ranking;
    pub mod identification;
}

pub mod error;
