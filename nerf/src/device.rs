use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NerfError;

/// A compute device the renderer runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
        }
    }
}

/// The configured device before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// First accelerator if one is present, else CPU.
    Auto,
    Exact(Device),
}

impl FromStr for DeviceRequest {
    type Err = NerfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || NerfError::UnknownDevice(s.to_string());
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Exact(Device::Cpu)),
            "cuda" | "gpu" => Ok(Self::Exact(Device::Cuda(0))),
            other => other
                .strip_prefix("cuda:")
                .and_then(|i| i.parse().ok())
                .map(|i| Self::Exact(Device::Cuda(i)))
                .ok_or_else(unknown),
        }
    }
}

/// Reports whether an accelerator is present.
pub trait AcceleratorProbe {
    fn cuda_available(&self) -> bool;
}

/// Probes the host: `CUDA_VISIBLE_DEVICES` if set, else `/dev/nvidia0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl AcceleratorProbe for SystemProbe {
    fn cuda_available(&self) -> bool {
        match std::env::var("CUDA_VISIBLE_DEVICES") {
            Ok(v) => {
                let v = v.trim();
                !v.is_empty() && v != "-1"
            }
            Err(_) => Path::new("/dev/nvidia0").exists(),
        }
    }
}

impl DeviceRequest {
    /// Resolves the request once against `probe`.
    pub fn resolve(self, probe: &dyn AcceleratorProbe) -> Result<Device, NerfError> {
        let available = probe.cuda_available();
        let device = match self {
            Self::Auto if available => Device::Cuda(0),
            Self::Auto => Device::Cpu,
            Self::Exact(Device::Cpu) => Device::Cpu,
            Self::Exact(d @ Device::Cuda(_)) if available => d,
            Self::Exact(d) => return Err(NerfError::DeviceUnavailable(d.to_string())),
        };
        tracing::info!(%device, "device");
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    impl AcceleratorProbe for Fixed {
        fn cuda_available(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn parse_requests() {
        assert_eq!("auto".parse::<DeviceRequest>().unwrap(), DeviceRequest::Auto);
        assert_eq!("".parse::<DeviceRequest>().unwrap(), DeviceRequest::Auto);
        assert_eq!(
            "CUDA:1".parse::<DeviceRequest>().unwrap(),
            DeviceRequest::Exact(Device::Cuda(1))
        );
        assert!(matches!(
            "tpu".parse::<DeviceRequest>(),
            Err(NerfError::UnknownDevice(_))
        ));
    }

    #[test]
    fn auto_follows_probe() {
        assert_eq!(DeviceRequest::Auto.resolve(&Fixed(true)).unwrap(), Device::Cuda(0));
        assert_eq!(DeviceRequest::Auto.resolve(&Fixed(false)).unwrap(), Device::Cpu);
    }

    #[test]
    fn explicit_cuda_needs_accelerator() {
        let req = DeviceRequest::Exact(Device::Cuda(0));
        assert!(matches!(
            req.resolve(&Fixed(false)),
            Err(NerfError::DeviceUnavailable(_))
        ));
        assert_eq!(
            DeviceRequest::Exact(Device::Cpu).resolve(&Fixed(true)).unwrap(),
            Device::Cpu
        );
    }

    #[test]
    fn display() {
        assert_eq!(Device::Cuda(2).to_string(), "cuda:2");
        assert_eq!(Device::Cpu.to_string(), "cpu");
    }
}
