//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                    |
//! |------------|--------------|--------------------------------|
//! | `backend`  | BackendPort  | Offline demo registration/PUB  |
//! | `log_sink` | EventSink    | Serial log output              |
//! | `nvs`      | StoragePort  | NVS / in-memory store          |
//! | `serial`   | ByteSource   | PMS5003 UART RX                |
//! | `system`   | SystemPort   | Heap metrics, esp_restart      |
//! | `time`     | Clock        | ESP32 system timer             |
//! | `wifi`     | StationPort  | ESP-IDF WiFi STA               |

pub mod backend;
pub mod log_sink;
pub mod nvs;
pub mod serial;
pub mod system;
pub mod time;
pub mod wifi;
