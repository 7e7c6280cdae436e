pub mod apple_watch;
