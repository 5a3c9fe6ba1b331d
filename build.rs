fn main() {
    // Propagate the ESP-IDF build environment only for device builds; host
    // builds (tests, fuzzing) compile without the IDF toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
