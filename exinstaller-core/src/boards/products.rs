//! DCC-EX firmware products and the devices each one builds for.

/// Static description of one installable firmware product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductDetails {
    /// Registry key, e.g. `ex_commandstation`.
    pub key: &'static str,
    pub product_name: &'static str,
    /// GitHub `owner/name`.
    pub repo_name: &'static str,
    pub repo_url: &'static str,
    pub default_branch: &'static str,
    /// FQBNs of every device the product can be built for.
    pub supported_devices: &'static [&'static str],
    /// Config files that must exist before the sketch will compile.
    pub minimum_config_files: &'static [&'static str],
}

impl ProductDetails {
    pub fn supports(&self, fqbn: &str) -> bool {
        self.supported_devices.contains(&fqbn)
    }
}

pub(crate) const PRODUCTS: &[ProductDetails] = &[
    ProductDetails {
        key: "ex_commandstation",
        product_name: "EX-CommandStation",
        repo_name: "DCC-EX/CommandStation-EX",
        repo_url: "https://github.com/DCC-EX/CommandStation-EX.git",
        default_branch: "master",
        supported_devices: &[
            "arduino:avr:mega",
            "arduino:avr:uno",
            "arduino:avr:nano",
            "esp32:esp32:esp32",
            "STMicroelectronics:stm32:Nucleo_64:pnum=NUCLEO_F411RE",
            "STMicroelectronics:stm32:Nucleo_64:pnum=NUCLEO_F446RE",
        ],
        minimum_config_files: &["config.h"],
    },
    ProductDetails {
        key: "ex_ioexpander",
        product_name: "EX-IOExpander",
        repo_name: "DCC-EX/EX-IOExpander",
        repo_url: "https://github.com/DCC-EX/EX-IOExpander.git",
        default_branch: "main",
        supported_devices: &[
            "arduino:avr:uno",
            "arduino:avr:nano",
            "arduino:avr:mega",
            "STMicroelectronics:stm32:Nucleo_64:pnum=NUCLEO_F411RE",
        ],
        minimum_config_files: &["myConfig.h"],
    },
    ProductDetails {
        key: "ex_turntable",
        product_name: "EX-Turntable",
        repo_name: "DCC-EX/EX-Turntable",
        repo_url: "https://github.com/DCC-EX/EX-Turntable.git",
        default_branch: "main",
        supported_devices: &["arduino:avr:uno", "arduino:avr:nano"],
        minimum_config_files: &["config.h"],
    },
];
