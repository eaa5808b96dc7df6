
use crt0_loader::*;
use std::cell::Cell;
use std::panic::{ self, AssertUnwindSafe };



mod image;

use self::image::*;



fn sample() -> BuiltImage {
    ImageBuilder::new().got(&[0x8000_0000]).data_words(&[0x10]).reloc(4).build()
}

#[test]
fn main_runs_once_after_fixups_then_parks() {
    init_logger();

    let img   = sample();
    let image = Image::try_parse(&img.bytes, APP_START).expect("Parsing the image failed");
    let s     = TEST_STACK_SIZE as usize;

    let mut ram      = app_ram(img.heap_size() as usize);
    let mut kernel   = MockKernel::yield_limit(3);
    let mut platform = MockPlatform::default();
    let     calls    = Cell::new(0);

    let running = image.try_boot(
        &Config::new(TEST_STACK_SIZE), MEM_START, AppMemory::new(MEM_START, &mut ram),
        &mut kernel, &mut platform,
    ).expect("Booting the image failed");

    let ram = &ram;
    let res = panic::catch_unwind::<_, ()>(AssertUnwindSafe(|| running.enter(|| {
        // Everything must be in place by the time `main` runs.
        assert_eq!(word_at(ram, s    ), APP_START + HEADER_LEN);
        assert_eq!(word_at(ram, s + 4), RAM_BASE + 0x10);

        calls.set(calls.get() + 1);
    })));

    assert!(res.is_err(), "the parking loop returned");
    assert_eq!(calls.get(), 1);
    assert_eq!(kernel.yields(), 3);
    assert_eq!(&kernel.calls[3..], &[Call::Yield, Call::Yield, Call::Yield]);
}

#[test]
fn park_only_ever_yields() {
    init_logger();

    let img   = sample();
    let image = Image::try_parse(&img.bytes, APP_START).expect("Parsing the image failed");

    let mut ram      = app_ram(img.heap_size() as usize);
    let mut kernel   = MockKernel::yield_limit(5);
    let mut platform = MockPlatform::default();

    let running = image.try_boot(
        &Config::new(TEST_STACK_SIZE), MEM_START, AppMemory::new(MEM_START, &mut ram),
        &mut kernel, &mut platform,
    ).expect("Booting the image failed");

    let res = panic::catch_unwind::<_, ()>(AssertUnwindSafe(|| running.park()));

    assert!(res.is_err(), "the parking loop returned");
    assert_eq!(kernel.yields(), 5);
    assert!(kernel.calls[3..].iter().all(|c| *c == Call::Yield));
}

#[test]
fn each_step_is_one_yield() {
    let img   = sample();
    let image = Image::try_parse(&img.bytes, APP_START).expect("Parsing the image failed");

    let mut ram      = app_ram(img.heap_size() as usize);
    let mut kernel   = MockKernel::new();
    let mut platform = MockPlatform::default();

    let mut running = image.try_boot(
        &Config::new(TEST_STACK_SIZE), MEM_START, AppMemory::new(MEM_START, &mut ram),
        &mut kernel, &mut platform,
    ).expect("Booting the image failed");

    assert_eq!(running.layout().ram_base, RAM_BASE);

    running.step();
    running.step();
    drop(running);

    assert_eq!(kernel.yields(), 2);
}
