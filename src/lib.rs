pub mod arena;

pub mod character;

pub mod contract;

pub mod deployment;

pub mod local;

pub mod session;

pub mod test_helpers;

pub mod wallet;
