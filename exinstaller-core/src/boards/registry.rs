//! Static board registry.
//!
//! Everything here is compiled in and never mutated, so the registry can be
//! shared by `&'static` reference between the facade and any worker without
//! synchronization.

use super::products::{ProductDetails, PRODUCTS};

// ============================================================================
// Entry Types
// ============================================================================

/// A platform package (core) the tool installs to support a device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformEntry {
    /// Human-readable name, e.g. "Arduino AVR".
    pub name: &'static str,
    /// Platform identifier in `vendor:architecture` form.
    pub platform_id: &'static str,
    /// Pinned release. Locked for compatibility with the firmware sources.
    pub version: &'static str,
    /// Board-manager index the tool needs to resolve this platform, if it is
    /// not part of the default index.
    pub index_url: Option<&'static str>,
}

impl PlatformEntry {
    pub const fn new(
        name: &'static str,
        platform_id: &'static str,
        version: &'static str,
        index_url: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            platform_id,
            version,
            index_url,
        }
    }

    /// Returns the `id@version` form accepted by `core install`.
    pub fn install_spec(&self) -> String {
        format!("{}@{}", self.platform_id, self.version)
    }

    /// Returns true if `fqbn` names a board provided by this platform.
    pub fn provides(&self, fqbn: &str) -> bool {
        fqbn.strip_prefix(self.platform_id)
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

/// A supported device and its fully-qualified board name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    pub name: &'static str,
    pub fqbn: &'static str,
}

impl DeviceEntry {
    pub const fn new(name: &'static str, fqbn: &'static str) -> Self {
        Self { name, fqbn }
    }
}

/// An optional library usable by the firmware products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: &'static str,
    pub version: &'static str,
}

impl LibraryEntry {
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }

    /// Returns the `name@version` form accepted by `lib install`.
    pub fn install_spec(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

// ============================================================================
// Built-in Tables
// ============================================================================

const ESP32_INDEX_URL: &str = "https://espressif.github.io/arduino-esp32/package_esp32_index.json";

const STM32_INDEX_URL: &str =
    "https://github.com/stm32duino/BoardManagerFiles/raw/main/package_stmicroelectronics_index.json";

const BASE_PLATFORMS: &[PlatformEntry] = &[PlatformEntry::new(
    "Arduino AVR",
    "arduino:avr",
    "1.8.6",
    None,
)];

const EXTRA_PLATFORMS: &[PlatformEntry] = &[
    // 3.x breaks the EX-CommandStation build; do not bump.
    PlatformEntry::new(
        "Espressif ESP32",
        "esp32:esp32",
        "2.0.17",
        Some(ESP32_INDEX_URL),
    ),
    PlatformEntry::new(
        "STMicroelectronics Nucleo/STM32",
        "STMicroelectronics:stm32",
        "2.7.1",
        Some(STM32_INDEX_URL),
    ),
];

const SUPPORTED_DEVICES: &[DeviceEntry] = &[
    DeviceEntry::new("Arduino Mega or Mega 2560", "arduino:avr:mega"),
    DeviceEntry::new("Arduino Uno", "arduino:avr:uno"),
    DeviceEntry::new("Arduino Nano", "arduino:avr:nano"),
    DeviceEntry::new("ESP32 Dev Kit", "esp32:esp32:esp32"),
    DeviceEntry::new(
        "STMicroelectronics Nucleo F411RE",
        "STMicroelectronics:stm32:Nucleo_64:pnum=NUCLEO_F411RE",
    ),
    DeviceEntry::new(
        "STMicroelectronics Nucleo F446RE",
        "STMicroelectronics:stm32:Nucleo_64:pnum=NUCLEO_F446RE",
    ),
];

const DCCEX_DEVICES: &[DeviceEntry] = &[DeviceEntry::new("DCC-EX EX-CSB1", "esp32:esp32:esp32")];

const LIBRARIES: &[LibraryEntry] = &[LibraryEntry::new("Ethernet", "2.0.2")];

static BUILTIN: BoardRegistry = BoardRegistry {
    base_platforms: BASE_PLATFORMS,
    extra_platforms: EXTRA_PLATFORMS,
    supported_devices: SUPPORTED_DEVICES,
    dccex_devices: DCCEX_DEVICES,
    libraries: LIBRARIES,
    products: PRODUCTS,
};

// ============================================================================
// Registry
// ============================================================================

/// Read-only lookup surface over the board, platform and library tables.
#[derive(Debug)]
pub struct BoardRegistry {
    base_platforms: &'static [PlatformEntry],
    extra_platforms: &'static [PlatformEntry],
    supported_devices: &'static [DeviceEntry],
    dccex_devices: &'static [DeviceEntry],
    libraries: &'static [LibraryEntry],
    products: &'static [ProductDetails],
}

impl BoardRegistry {
    /// Returns the registry compiled into this binary.
    pub fn builtin() -> &'static BoardRegistry {
        &BUILTIN
    }

    /// Platforms every installation needs.
    pub fn base_platforms(&self) -> &'static [PlatformEntry] {
        self.base_platforms
    }

    /// Platforms installed only for devices that need them.
    pub fn extra_platforms(&self) -> &'static [PlatformEntry] {
        self.extra_platforms
    }

    /// All platforms, base first.
    pub fn platforms(&self) -> impl Iterator<Item = &'static PlatformEntry> {
        self.base_platforms.iter().chain(self.extra_platforms.iter())
    }

    /// Looks a platform up by its display name.
    pub fn platform(&self, name: &str) -> Option<&'static PlatformEntry> {
        self.platforms().find(|p| p.name == name)
    }

    /// Looks a platform up by its `vendor:architecture` identifier.
    pub fn platform_by_id(&self, platform_id: &str) -> Option<&'static PlatformEntry> {
        self.platforms().find(|p| p.platform_id == platform_id)
    }

    pub fn supported_devices(&self) -> &'static [DeviceEntry] {
        self.supported_devices
    }

    /// DCC-EX branded boards.
    pub fn dccex_devices(&self) -> &'static [DeviceEntry] {
        self.dccex_devices
    }

    /// Resolves a device display name to its FQBN.
    ///
    /// Generic devices are searched before DCC-EX branded boards.
    pub fn device_identifier(&self, name: &str) -> Option<&'static str> {
        self.supported_devices
            .iter()
            .chain(self.dccex_devices.iter())
            .find(|d| d.name == name)
            .map(|d| d.fqbn)
    }

    /// Returns the platform providing the board named by `fqbn`.
    pub fn platform_for_fqbn(&self, fqbn: &str) -> Option<&'static PlatformEntry> {
        self.platforms().find(|p| p.provides(fqbn))
    }

    pub fn libraries_available(&self) -> &'static [LibraryEntry] {
        self.libraries
    }

    pub fn library(&self, name: &str) -> Option<&'static LibraryEntry> {
        self.libraries.iter().find(|l| l.name == name)
    }

    pub fn products(&self) -> &'static [ProductDetails] {
        self.products
    }

    /// Looks a product up by its key, e.g. `ex_commandstation`.
    pub fn product(&self, key: &str) -> Option<&'static ProductDetails> {
        self.products.iter().find(|p| p.key == key)
    }

    /// Returns the platforms needed to build any device `product` supports,
    /// in registry order. Unknown products yield an empty list.
    pub fn platforms_for_product(&self, key: &str) -> Vec<&'static PlatformEntry> {
        let Some(product) = self.product(key) else {
            return Vec::new();
        };

        self.platforms()
            .filter(|p| product.supported_devices.iter().any(|fqbn| p.provides(fqbn)))
            .collect()
    }

    /// Products that can be built for the device `fqbn`.
    pub fn products_for_device(&self, fqbn: &str) -> Vec<&'static ProductDetails> {
        self.products.iter().filter(|p| p.supports(fqbn)).collect()
    }
}
