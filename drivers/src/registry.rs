/*++

Licensed under the Apache-2.0 license.

File Name:

    registry.rs

Abstract:

    File contains the registry binding transforms to engine instances.

--*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::Mmio;

use crate::config::EngineConfig;
use crate::dma::{DmaMapper, ZeroPad};
use crate::engine::{lock, EngineInstance, EngineSession};
use crate::wait::Clock;

/// Identifies one transform (cipher or hash context) to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformHandle(u64);

struct Device {
    mmio: Arc<dyn Mmio>,
    instance: Option<Arc<EngineInstance>>,
}

struct Binding {
    handle: TransformHandle,
    device: usize,
    instance: Arc<EngineInstance>,
}

#[derive(Default)]
struct RegistryInner {
    devices: Vec<Device>,
    bindings: Vec<Binding>,
}

/// Owns the engines of one driver instance and hands them to transforms.
///
/// The registry lock only covers lookup and binding. Operations run under
/// the per-instance lock taken by [`EngineRegistry::with_engine`].
pub struct EngineRegistry {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    mapper: Arc<dyn DmaMapper>,
    inner: Mutex<RegistryInner>,
    zero_pad: Mutex<Option<Arc<ZeroPad>>>,
    next_handle: AtomicU64,
}

impl EngineRegistry {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        mapper: Arc<dyn DmaMapper>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clock,
            mapper,
            inner: Mutex::new(RegistryInner::default()),
            zero_pad: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers the engine behind `mmio`. Returns its index.
    pub fn add_engine(&self, mmio: Arc<dyn Mmio>) -> usize {
        let mut inner = lock(&self.inner);
        inner.devices.push(Device {
            mmio,
            instance: None,
        });
        let index = inner.devices.len() - 1;
        log::info!("registered engine {index}");
        index
    }

    pub fn engine_count(&self) -> usize {
        lock(&self.inner).devices.len()
    }

    pub fn binding_count(&self) -> usize {
        lock(&self.inner).bindings.len()
    }

    pub fn new_handle(&self) -> TransformHandle {
        TransformHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the instance `handle` is bound to, binding it to the
    /// least-loaded engine on first use.
    pub fn acquire(&self, handle: TransformHandle) -> HwCryptoResult<Arc<EngineInstance>> {
        let mut inner = lock(&self.inner);
        if let Some(binding) = inner.bindings.iter().find(|b| b.handle == handle) {
            return Ok(binding.instance.clone());
        }

        let device = (0..inner.devices.len())
            .min_by_key(|&i| inner.bindings.iter().filter(|b| b.device == i).count())
            .ok_or(HwCryptoError::DRIVER_REGISTRY_ENGINE_UNAVAILABLE)?;
        let config = &self.config;
        let slot = &mut inner.devices[device];
        let instance = match &slot.instance {
            Some(instance) => instance.clone(),
            None => {
                log::info!("bringing up engine {device}");
                let instance =
                    Arc::new(EngineInstance::new(device, slot.mmio.clone(), config));
                slot.instance = Some(instance.clone());
                instance
            }
        };
        log::debug!("{handle:?} bound to engine {device}");
        inner.bindings.push(Binding {
            handle,
            device,
            instance: instance.clone(),
        });
        Ok(instance)
    }

    /// Forgets the binding of `handle`. Called when a transform is dropped.
    pub fn unbind(&self, handle: TransformHandle) {
        lock(&self.inner).bindings.retain(|b| b.handle != handle);
    }

    /// The shared zero-padding buffer, mapped on first use.
    pub fn zero_pad(&self) -> HwCryptoResult<Arc<ZeroPad>> {
        let mut zero_pad = lock(&self.zero_pad);
        if let Some(zero_pad) = zero_pad.as_ref() {
            return Ok(zero_pad.clone());
        }
        let new = Arc::new(ZeroPad::new(self.mapper.clone())?);
        *zero_pad = Some(new.clone());
        Ok(new)
    }

    /// Runs `f` with exclusive use of the engine bound to `handle`.
    ///
    /// Buffers mapped through the session are unmapped before the engine is
    /// released.
    pub fn with_engine<T, F>(&self, handle: TransformHandle, f: F) -> HwCryptoResult<T>
    where
        F: FnOnce(&mut EngineSession<'_>) -> HwCryptoResult<T>,
    {
        let instance = self.acquire(handle)?;
        let zero_pad = self.zero_pad()?;
        let mut guard = instance.lock()?;
        let mut session = guard.session(
            handle,
            &self.config,
            &*self.clock,
            &*self.mapper,
            zero_pad.addr(),
        )?;
        f(&mut session)
    }

    /// Whether the engine bound to `handle` refuses work until reset.
    pub fn needs_reset(&self, handle: TransformHandle) -> HwCryptoResult<bool> {
        let instance = self.acquire(handle)?;
        let guard = instance.lock()?;
        Ok(guard.needs_reset())
    }

    /// Resets the engine bound to `handle`, clearing a timeout or fault.
    pub fn reset(&self, handle: TransformHandle) -> HwCryptoResult<()> {
        let instance = self.acquire(handle)?;
        let mut guard = instance.lock()?;
        guard.reset(&self.config);
        Ok(())
    }

    /// Drops every binding, instance and the zero-padding buffer.
    pub fn teardown(&self) {
        let mut inner = lock(&self.inner);
        inner.bindings.clear();
        inner.devices.clear();
        drop(inner);
        *lock(&self.zero_pad) = None;
        log::info!("engine registry torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::testing::FakeMapper;
    use crate::wait::SystemClock;
    use hwcrypto_registers::offsets;
    use std::collections::HashMap;

    /// Register file where every FIFO has room and every operation completes
    /// immediately.
    #[derive(Default)]
    struct IdleEngine {
        regs: Mutex<HashMap<u32, u32>>,
    }

    impl Mmio for IdleEngine {
        fn read32(&self, offset: u32) -> u32 {
            match offset {
                offsets::SRC_STATUS | offsets::DST_STATUS => 16 << 16,
                offsets::CTRL_STATUS => 1 << 4,
                offsets::ERR_STATUS => 0,
                _ => *self.regs.lock().unwrap().get(&offset).unwrap_or(&0),
            }
        }

        fn write32(&self, offset: u32, val: u32) {
            self.regs.lock().unwrap().insert(offset, val);
        }
    }

    fn registry(engines: usize) -> Arc<EngineRegistry> {
        let registry = EngineRegistry::new(
            EngineConfig::default(),
            Arc::new(SystemClock::default()),
            Arc::new(FakeMapper::default()),
        );
        for _ in 0..engines {
            registry.add_engine(Arc::new(IdleEngine::default()));
        }
        registry
    }

    #[test]
    fn test_no_engine() {
        let registry = registry(0);
        let handle = registry.new_handle();
        assert_eq!(
            registry.acquire(handle).err(),
            Some(HwCryptoError::DRIVER_REGISTRY_ENGINE_UNAVAILABLE)
        );
    }

    #[test]
    fn test_least_loaded_binding() {
        let registry = registry(2);
        let a = registry.new_handle();
        let b = registry.new_handle();
        let c = registry.new_handle();
        assert_eq!(registry.acquire(a).unwrap().id(), 0);
        assert_eq!(registry.acquire(b).unwrap().id(), 1);
        assert_eq!(registry.acquire(a).unwrap().id(), 0);
        registry.unbind(a);
        assert_eq!(registry.acquire(c).unwrap().id(), 0);
        assert_eq!(registry.binding_count(), 2);
    }

    #[test]
    fn test_instance_configured_on_bind() {
        let engine = Arc::new(IdleEngine::default());
        let registry = registry(0);
        registry.add_engine(engine.clone());
        registry.acquire(registry.new_handle()).unwrap();
        let regs = engine.regs.lock().unwrap();
        assert_eq!(regs[&offsets::DEBUG_ARB], 0b11);
        assert_eq!(regs[&offsets::SWAP_CFG], (4 << 4) | 1);
        assert_eq!(regs[&offsets::OTP_KEY_CTRL], 0);
    }

    #[test]
    fn test_reentrant_acquire_is_rejected() {
        let registry = registry(1);
        let handle = registry.new_handle();
        let result = registry.with_engine(handle, |_| registry.with_engine(handle, |_| Ok(())));
        assert_eq!(result, Err(HwCryptoError::DRIVER_REGISTRY_REENTRANT_ACQUIRE));
        // The lock is released again afterwards.
        assert_eq!(registry.with_engine(handle, |_| Ok(1)), Ok(1));
    }

    #[test]
    fn test_zero_pad_shared_until_teardown() {
        let mapper = Arc::new(FakeMapper::default());
        let registry = EngineRegistry::new(
            EngineConfig::default(),
            Arc::new(SystemClock::default()),
            mapper.clone(),
        );
        let a = registry.zero_pad().unwrap();
        let b = registry.zero_pad().unwrap();
        assert_eq!(a.addr(), b.addr());
        drop((a, b));
        assert_eq!(mapper.live.lock().unwrap().len(), 1);
        registry.teardown();
        assert!(mapper.live.lock().unwrap().is_empty());
        assert_eq!(registry.engine_count(), 0);
    }
}
