// camfleet-api: transport clients and collaborator seams for camera fleets

pub mod arp;
pub mod bridge;
pub mod error;
pub mod http;
pub mod models;
pub mod radio;
pub mod sdk;
pub mod transport;

pub use arp::{AddressTable, SystemAddressTable};
pub use bridge::BridgeSdk;
pub use error::Error;
pub use http::{CameraHttpClient, DEVICE_AP_URL, home_network_url};
pub use models::{
    Advertisement, CameraState, HomeNetworkStatus, MediaFile, NetworkJoinState, ShortRangeStatus,
};
pub use radio::{NmcliRadio, WifiRadio};
pub use sdk::{DeviceTarget, ShortRangeSdk};
pub use transport::{TlsMode, TransportConfig};
