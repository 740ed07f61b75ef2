// Licensed under the Apache-2.0 license

use hwcrypto_drivers::{
    AeadRequest, CipherMode, Clock, EngineConfig, HashAlgorithm, HwCryptoError, SeqState, AAD_MAX,
};
use hwcrypto_hw_model::{HwModel, InitParams, ModelEmulated, FIFO_DEPTH};
use hwcrypto_registers::regs::ErrStatus;
use std::sync::atomic::{AtomicUsize, Ordering};

fn model_with(params: InitParams) -> ModelEmulated {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init();
    ModelEmulated::init(params).unwrap()
}

fn model() -> ModelEmulated {
    model_with(InitParams::default())
}

fn ecb_once(model: &ModelEmulated) -> Result<(), HwCryptoError> {
    let mut ctx = model.cipher(CipherMode::Ecb);
    ctx.set_key(&[7; 16])?;
    let mut out = [0u8; 32];
    ctx.encrypt_slice(&[], &[1; 32], &mut out)
}

#[test]
fn test_completion_timeout_requires_reset() {
    let model = model();
    let control = model.engine_control(0).unwrap();
    let mut ctx = model.cipher(CipherMode::Cbc);
    ctx.set_key(&[1; 32]).unwrap();
    let iv = [2u8; 16];
    let mut out = [0u8; 48];

    control.set_never_complete(true);
    let before = model.clock().now();
    assert_eq!(
        ctx.encrypt_slice(&iv, &[3; 48], &mut out),
        Err(HwCryptoError::DRIVER_ENGINE_HARDWARE_TIMEOUT)
    );
    assert!(model.clock().now() - before >= EngineConfig::default().completion_timeout);
    assert!(model.registry().needs_reset(ctx.handle()).unwrap());

    control.set_never_complete(false);
    assert_eq!(
        ctx.encrypt_slice(&iv, &[3; 48], &mut out),
        Err(HwCryptoError::DRIVER_ENGINE_RESET_REQUIRED)
    );
    assert_eq!(control.started(), 1);

    ctx.reset_engine().unwrap();
    assert!(!model.registry().needs_reset(ctx.handle()).unwrap());
    ctx.encrypt_slice(&iv, &[3; 48], &mut out).unwrap();
    let mut back = [0u8; 48];
    ctx.decrypt_slice(&iv, &out, &mut back).unwrap();
    assert_eq!(back, [3; 48]);
}

#[test]
fn test_slow_completion_within_timeout() {
    let model = model();
    model.engine_control(0).unwrap().set_completion_delay(100);
    ecb_once(&model).unwrap();
}

#[test]
fn test_hardware_error_reported_as_fault() {
    let model = model();
    let control = model.engine_control(0).unwrap();
    let mut ctx = model.cipher(CipherMode::Ctr);
    ctx.set_key(&[9; 24]).unwrap();
    let mut out = [0xaa; 20];

    control.inject_error(ErrStatus::DMA_READ);
    assert_eq!(
        ctx.encrypt_slice(&[0; 16], &[5; 20], &mut out),
        Err(HwCryptoError::DRIVER_ENGINE_HARDWARE_FAULT)
    );
    assert_eq!(out, [0xaa; 20]);
    assert!(model.registry().needs_reset(ctx.handle()).unwrap());

    ctx.reset_engine().unwrap();
    ctx.encrypt_slice(&[0; 16], &[5; 20], &mut out).unwrap();
    assert_ne!(out, [0xaa; 20]);
}

#[test]
fn test_stalled_fifo_times_out_submission() {
    let model = model_with(InitParams {
        config: EngineConfig {
            fifo_poll_limit: 50,
            ..Default::default()
        },
        ..Default::default()
    });
    let control = model.engine_control(0).unwrap();
    let mut ctx = model.cipher(CipherMode::Gcm);
    ctx.set_key(&[4; 16]).unwrap();
    let iv = [6u8; 12];
    let src = vec![8u8; AAD_MAX + 1];
    let mut dst = vec![0u8; AAD_MAX + 1 + 16];
    let seal = |dst: &mut [u8]| {
        ctx.aead_encrypt(AeadRequest {
            iv: &iv,
            src: &[&src[..]],
            dst: &mut [dst],
            assoclen: AAD_MAX,
            cryptlen: 1,
        })
    };

    // With the prefetcher running, more descriptors than FIFO slots still
    // go through.
    assert!(AAD_MAX / 16 > FIFO_DEPTH);
    seal(&mut dst[..]).unwrap();

    control.set_stall_fifo(true);
    assert_eq!(
        seal(&mut dst[..]),
        Err(HwCryptoError::DRIVER_ENGINE_FIFO_SUBMISSION_TIMEOUT)
    );
    assert_eq!(control.started(), 1);

    control.set_stall_fifo(false);
    assert_eq!(
        seal(&mut dst[..]),
        Err(HwCryptoError::DRIVER_ENGINE_RESET_REQUIRED)
    );
    ctx.reset_engine().unwrap();
    seal(&mut dst[..]).unwrap();
    assert_eq!(control.started(), 2);
}

#[test]
fn test_hash_abort_is_sticky() {
    let model = model();
    let control = model.engine_control(0).unwrap();
    let ctx = model.hash(HashAlgorithm::Sha256);
    let mut req = ctx.init().unwrap();
    req.update(&[1; 64]).unwrap();

    control.set_never_complete(true);
    assert_eq!(
        req.update(&[2; 10]),
        Err(HwCryptoError::DRIVER_ENGINE_HARDWARE_TIMEOUT)
    );
    assert_eq!(req.seq_state(), SeqState::Aborted);
    assert_eq!(req.update(&[3]), Err(HwCryptoError::DRIVER_HASH_ABORTED));
    let mut out = [0u8; 32];
    assert_eq!(req.finalize(&mut out), Err(HwCryptoError::DRIVER_HASH_ABORTED));

    control.set_never_complete(false);
    ctx.reset_engine().unwrap();
    let mut req = ctx.init().unwrap();
    req.update(b"abc").unwrap();
    req.finalize(&mut out).unwrap();
    assert_eq!(
        hex::encode(out),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_allocation_failure_releases_buffers() {
    let model = model();
    ecb_once(&model).unwrap();
    // Only the shared zero-padding buffer stays mapped between operations.
    let baseline = model.memory().live_regions();
    assert_eq!(baseline, 1);

    for successes in 0..3 {
        model.memory().fail_alloc_after(successes);
        assert_eq!(
            ecb_once(&model),
            Err(HwCryptoError::DRIVER_DMA_BUFFER_ALLOCATION_FAILED),
            "after {successes} allocations"
        );
        assert_eq!(model.memory().live_regions(), baseline);
    }

    let mut hmac = model.hmac(HashAlgorithm::Sha1);
    hmac.set_key(b"key").unwrap();
    model.memory().fail_alloc_after(1);
    let mut out = [0u8; 20];
    assert_eq!(
        hmac.digest(b"data", &mut out),
        Err(HwCryptoError::DRIVER_DMA_BUFFER_ALLOCATION_FAILED)
    );
    assert_eq!(model.memory().live_regions(), baseline);

    ecb_once(&model).unwrap();
    hmac.digest(b"data", &mut out).unwrap();
    assert_eq!(model.engine_control(0).unwrap().started(), 3);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Source,
    Destination,
    Running,
}

#[test]
fn test_operations_never_interleave() {
    let model = model();
    let mut shared = model.cipher(CipherMode::Cbc);
    shared.set_key(&[5; 32]).unwrap();
    // Hold each operation between start and completion long enough for the
    // other threads to pile up on the engine lock.
    model.engine_control(0).unwrap().set_completion_delay(20);
    let cipher_ops = AtomicUsize::new(0);
    let hash_ops = AtomicUsize::new(0);
    std::thread::scope(|s| {
        for t in 0..4u8 {
            let model = &model;
            let shared = &shared;
            let cipher_ops = &cipher_ops;
            let hash_ops = &hash_ops;
            s.spawn(move || {
                for i in 0..10u8 {
                    if (t + i) % 2 == 0 {
                        let mut out = [0u8; 40];
                        shared.encrypt_slice(&[t; 16], &[i; 40], &mut out).unwrap();
                        cipher_ops.fetch_add(1, Ordering::Relaxed);
                    } else {
                        let mut out = [0u8; 32];
                        model
                            .hash(HashAlgorithm::Sha256)
                            .digest(&[t; 200], &mut out)
                            .unwrap();
                        hash_ops.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let mut phase = Phase::Idle;
    let mut done = 0;
    for line in model.event_log().take().lines() {
        let event = line.split_whitespace().next().unwrap_or_default();
        phase = match (phase, event) {
            (Phase::Idle, "reset") => Phase::Idle,
            (Phase::Idle | Phase::Source, "src") => Phase::Source,
            (Phase::Source | Phase::Destination, "dst") => Phase::Destination,
            (Phase::Destination, "start") => Phase::Running,
            (Phase::Running, "done") => {
                assert_eq!(line, "done 0x0");
                done += 1;
                Phase::Idle
            }
            (phase, _) => panic!("unexpected {line:?} in {phase:?}"),
        };
    }
    assert_eq!(phase, Phase::Idle);
    // SHA256 over 200 bytes takes four engine calls.
    let expected = cipher_ops.into_inner() + 4 * hash_ops.into_inner();
    assert_eq!(done, expected);
}

#[test]
fn test_transforms_spread_over_engines() {
    let model = model_with(InitParams {
        engines: 2,
        ..Default::default()
    });
    let run = |ctx: &hwcrypto_drivers::CipherContext| {
        let mut out = [0u8; 16];
        ctx.encrypt_slice(&[], &[0; 16], &mut out).unwrap();
    };

    let mut a = model.cipher(CipherMode::Ecb);
    let mut b = model.cipher(CipherMode::Ecb);
    a.set_key(&[1; 16]).unwrap();
    b.set_key(&[2; 16]).unwrap();
    run(&a);
    run(&b);
    run(&a);
    assert_eq!(model.engine_control(0).unwrap().started(), 2);
    assert_eq!(model.engine_control(1).unwrap().started(), 1);
    assert_eq!(model.registry().binding_count(), 2);

    drop(a);
    assert_eq!(model.registry().binding_count(), 1);
    let mut c = model.cipher(CipherMode::Ecb);
    c.set_key(&[3; 16]).unwrap();
    run(&c);
    assert_eq!(model.engine_control(0).unwrap().started(), 3);

    // A fault on one engine leaves the other usable.
    model.engine_control(0).unwrap().set_never_complete(true);
    let mut out = [0u8; 16];
    assert_eq!(
        c.encrypt_slice(&[], &[0; 16], &mut out),
        Err(HwCryptoError::DRIVER_ENGINE_HARDWARE_TIMEOUT)
    );
    run(&b);
    assert_eq!(model.engine_control(1).unwrap().started(), 2);
}

#[test]
fn test_added_engine_takes_new_bindings() {
    let mut model = model();
    let mut first = model.cipher(CipherMode::Ecb);
    first.set_key(&[1; 16]).unwrap();
    let mut out = [0u8; 16];
    first.encrypt_slice(&[], &[0; 16], &mut out).unwrap();

    assert_eq!(model.add_engine(), 1);
    assert_eq!(model.registry().engine_count(), 2);
    ecb_once(&model).unwrap();
    assert_eq!(model.engine_control(1).unwrap().started(), 1);
}

#[test]
fn test_teardown_releases_everything() {
    let model = model();
    let mut ctx = model.cipher(CipherMode::Ecb);
    ctx.set_key(&[1; 16]).unwrap();
    let mut out = [0u8; 16];
    ctx.encrypt_slice(&[], &[0; 16], &mut out).unwrap();
    assert!(model.memory().live_regions() > 0);

    model.registry().teardown();
    assert_eq!(model.memory().live_regions(), 0);
    assert_eq!(model.registry().engine_count(), 0);
    assert_eq!(model.registry().binding_count(), 0);
    assert_eq!(
        ctx.encrypt_slice(&[], &[0; 16], &mut out),
        Err(HwCryptoError::DRIVER_REGISTRY_ENGINE_UNAVAILABLE)
    );
}

#[test]
fn test_bus_trace() {
    let model = model_with(InitParams {
        trace_bus: true,
        ..Default::default()
    });
    ecb_once(&model).unwrap();
    let trace = model.bus_log().unwrap().take();
    assert!(trace.contains("eng0 write4 *0x0004"), "{trace}");
    assert!(trace.contains("eng0  read4 *0x0010"), "{trace}");
}
