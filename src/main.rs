use burn::optim::AdamConfig;
use docangle_train::training::{self, TrainingConfig};

static ARTIFACT_DIR: &str = "artifacts";
static DATA_DIR: &str = "images";

fn config() -> TrainingConfig {
    TrainingConfig::new(AdamConfig::new())
}

fn main() {
    // The backend is a one-time, compile-time choice; the default build runs
    // on the general-purpose processor.
    #[cfg(all(
        feature = "ndarray",
        not(any(feature = "wgpu", feature = "tch-cpu", feature = "tch-gpu"))
    ))]
    {
        use burn::backend::{
            ndarray::{NdArray, NdArrayDevice},
            Autodiff,
        };

        training::train::<Autodiff<NdArray>>(ARTIFACT_DIR, DATA_DIR, config(), NdArrayDevice::Cpu);
    }

    #[cfg(feature = "wgpu")]
    {
        use burn::backend::{
            wgpu::{Wgpu, WgpuDevice},
            Autodiff,
        };

        training::train::<Autodiff<Wgpu>>(ARTIFACT_DIR, DATA_DIR, config(), WgpuDevice::default());
    }

    #[cfg(feature = "tch-cpu")]
    {
        use burn::backend::{
            libtorch::{LibTorch, LibTorchDevice},
            Autodiff,
        };

        training::train::<Autodiff<LibTorch>>(ARTIFACT_DIR, DATA_DIR, config(), LibTorchDevice::Cpu);
    }

    #[cfg(feature = "tch-gpu")]
    {
        use burn::backend::{
            libtorch::{LibTorch, LibTorchDevice},
            Autodiff,
        };

        #[cfg(not(target_os = "macos"))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(target_os = "macos")]
        let device = LibTorchDevice::Mps;

        training::train::<Autodiff<LibTorch>>(ARTIFACT_DIR, DATA_DIR, config(), device);
    }
}
