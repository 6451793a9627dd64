//! Test doubles for the platform boundary.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::ptr::NonNull;
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use std::vec::Vec;

use dso_hal::{
    ContigRegion, ContiguousAllocator, DisplayConsumer, FramebufferInfo, HalError,
    InterruptController, InterruptHandler, IrqCookie, IrqLine, MemAttr, Platform, PropertyError,
    PropertySource, RegisterSpace, StdWaitQueue, round_page,
};

use crate::config::{PANEL_PROPERTIES, PanelConfig};
use crate::regs;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A 7" 800x480 panel with inverted sync pulses.
pub fn panel_800x480() -> PanelConfig {
    PanelConfig {
        width: 800,
        hfrontporch: 210,
        hsync: 20,
        hbackporch: 46,
        overlayx: 0,
        overlaywidth: 800,
        height: 480,
        vfrontporch: 22,
        vsync: 10,
        vbackporch: 23,
        overlayy: 0,
        overlayheight: 480,
        deinverted: 0,
        hsyncinverted: 1,
        vsyncinverted: 1,
    }
}

/// A 4.3" 480x272 panel; its frame is not a whole number of pages.
pub fn panel_480x272() -> PanelConfig {
    PanelConfig {
        width: 480,
        hfrontporch: 2,
        hsync: 41,
        hbackporch: 2,
        overlayx: 0,
        overlaywidth: 480,
        height: 272,
        vfrontporch: 2,
        vsync: 10,
        vbackporch: 2,
        overlayy: 0,
        overlayheight: 272,
        deinverted: 0,
        hsyncinverted: 1,
        vsyncinverted: 1,
    }
}

/// `(name, value)` pairs for `config`, in load order.
pub fn panel_properties(config: &PanelConfig) -> Vec<(&'static str, u32)> {
    let values = [
        config.width,
        config.hfrontporch,
        config.hsync,
        config.hbackporch,
        config.overlayx,
        config.overlaywidth,
        config.height,
        config.vfrontporch,
        config.vsync,
        config.vbackporch,
        config.overlayy,
        config.overlayheight,
        config.deinverted,
        config.hsyncinverted,
        config.vsyncinverted,
    ];
    PANEL_PROPERTIES
        .iter()
        .zip(values)
        .map(|(&(name, _), value)| (name, value))
        .collect()
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MapProperties {
    values: BTreeMap<&'static str, Result<u32, PropertyError>>,
}

impl MapProperties {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            values: panel_properties(config)
                .into_iter()
                .map(|(name, value)| (name, Ok(value)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: &'static str, value: u32) {
        self.values.insert(name, Ok(value));
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn set_malformed(&mut self, name: &'static str) {
        self.values.insert(name, Err(PropertyError::Malformed));
    }
}

impl PropertySource for MapProperties {
    fn property_u32(&self, name: &str) -> Result<u32, PropertyError> {
        self.values
            .get(name)
            .copied()
            .unwrap_or(Err(PropertyError::NotFound))
    }
}

/// Builds a DTB with a single `/fb` node carrying `props`.
pub fn build_dtb(props: &[(&str, &[u8])]) -> Vec<u8> {
    fn push(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    fn pad(buf: &mut Vec<u8>) {
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    let mut strings = Vec::new();
    let mut structs = Vec::new();
    push(&mut structs, 1); // FDT_BEGIN_NODE, root
    push(&mut structs, 0);
    push(&mut structs, 1); // FDT_BEGIN_NODE, fb
    structs.extend_from_slice(b"fb\0");
    pad(&mut structs);
    for (key, value) in props {
        let nameoff = strings.len() as u32;
        strings.extend_from_slice(key.as_bytes());
        strings.push(0);
        push(&mut structs, 3); // FDT_PROP
        push(&mut structs, value.len() as u32);
        push(&mut structs, nameoff);
        structs.extend_from_slice(value);
        pad(&mut structs);
    }
    push(&mut structs, 2); // FDT_END_NODE
    push(&mut structs, 2);
    push(&mut structs, 9); // FDT_END

    let off_struct = 40 + 16;
    let off_strings = off_struct + structs.len();
    let mut dtb = Vec::new();
    for word in [
        0xd00d_feed,
        (off_strings + strings.len()) as u32,
        off_struct as u32,
        off_strings as u32,
        40,
        17,
        16,
        0,
        strings.len() as u32,
        structs.len() as u32,
    ] {
        push(&mut dtb, word);
    }
    dtb.extend_from_slice(&[0; 16]);
    dtb.extend_from_slice(&structs);
    dtb.extend_from_slice(&strings);
    dtb
}

// ----------------------------------------------------------------------------
// Registers
// ----------------------------------------------------------------------------

/// Register file that remembers every write.
#[derive(Debug, Default)]
pub struct RecordingRegs {
    values: Mutex<[u32; regs::REGS_SIZE / 4]>,
    writes: Mutex<Vec<(usize, u32)>>,
}

impl RecordingRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: usize) -> u32 {
        locked(&self.values)[offset / 4]
    }

    /// Sets a register without recording a write.
    pub fn set(&self, offset: usize, value: u32) {
        locked(&self.values)[offset / 4] = value;
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        locked(&self.writes).clone()
    }
}

impl RegisterSpace for RecordingRegs {
    fn read32(&self, offset: usize) -> u32 {
        self.get(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.set(offset, value);
        locked(&self.writes).push((offset, value));
    }
}

// ----------------------------------------------------------------------------
// Memory
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub size: usize,
    pub align: usize,
    pub phys: RangeInclusive<u64>,
    pub attr: MemAttr,
}

/// Heap-backed allocator that hands out fake low physical addresses.
#[derive(Debug)]
pub struct TrackingAllocator {
    fail: bool,
    events: Option<EventLog>,
    requests: Mutex<Vec<Request>>,
    next_paddr: AtomicU64,
    live: AtomicUsize,
    freed: AtomicUsize,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self {
            fail: false,
            events: None,
            requests: Mutex::new(Vec::new()),
            next_paddr: AtomicU64::new(0x8000_0000),
            live: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn last_request(&self) -> Option<Request> {
        locked(&self.requests).last().cloned()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    fn log(&self, event: Event) {
        if let Some(events) = &self.events {
            locked(events).push(event);
        }
    }
}

// SAFETY: blocks come from the global allocator with the requested layout and
// stay allocated until `free`.
unsafe impl ContiguousAllocator for TrackingAllocator {
    fn allocate(
        &self,
        size: usize,
        align: usize,
        phys: RangeInclusive<u64>,
        attr: MemAttr,
    ) -> Result<ContigRegion, HalError> {
        locked(&self.requests).push(Request {
            size,
            align,
            phys: phys.clone(),
            attr,
        });
        if self.fail {
            return Err(HalError::OutOfMemory);
        }
        let layout = Layout::from_size_align(size, align).map_err(|_| HalError::OutOfMemory)?;
        let vaddr = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(HalError::OutOfMemory)?;
        let paddr = self
            .next_paddr
            .fetch_add(round_page(size) as u64, Ordering::SeqCst);
        assert!(phys.contains(&paddr));

        self.live.fetch_add(1, Ordering::SeqCst);
        self.log(Event::Allocate(size));
        Ok(unsafe { ContigRegion::from_raw_parts(vaddr, paddr, size, align) })
    }

    fn free(&self, region: ContigRegion) {
        self.log(Event::Free(region.size()));
        let layout = Layout::from_size_align(region.size(), region.align()).unwrap();
        unsafe { dealloc(region.vaddr().as_ptr(), layout) };
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

// ----------------------------------------------------------------------------
// Platform
// ----------------------------------------------------------------------------

/// Externally visible platform operations, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MapRegisters,
    UnmapRegisters,
    AllocateIrq,
    ReleaseIrq,
    SetupIrq,
    TeardownIrq,
    Allocate(usize),
    Free(usize),
    AddChild,
    ChildAttach(String),
    ChildDetach,
    DeleteChild,
    /// Value written to CR.
    Signal(u32),
    /// Value written to FB_BASE.
    FbBase(u32),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Where a [`FakePlatform`] refuses a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    MapRegisters,
    AllocateIrq,
    SetupIrq,
    Allocate,
    AddChild,
    ChildAttach,
}

const FAKE_IRQ: u32 = 42;

/// Simulated controller: answers START/STOP with STARTED/STOPPED from
/// another thread, the way the interrupt would arrive on real hardware.
pub struct Hardware {
    regs: RecordingRegs,
    handler: Mutex<Option<Arc<dyn InterruptHandler>>>,
    silent: AtomicBool,
    events: EventLog,
}

impl Hardware {
    pub fn get(&self, offset: usize) -> u32 {
        self.regs.get(offset)
    }

    fn raise(&self, status: u32) {
        let isr = self.regs.get(regs::ISR);
        self.regs.set(regs::ISR, isr | status);
        let handler = locked(&self.handler).clone();
        if let Some(handler) = handler {
            handler.handle(FAKE_IRQ);
        }
    }
}

#[derive(Clone)]
pub struct FakeRegs(Arc<Hardware>);

impl RegisterSpace for FakeRegs {
    fn read32(&self, offset: usize) -> u32 {
        self.0.regs.read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        match offset {
            // Any acknowledge clears the latched status.
            regs::ISR => self.0.regs.write32(offset, 0),
            regs::CR => {
                self.0.regs.write32(offset, value);
                locked(&self.0.events).push(Event::Signal(value));
                if self.0.silent.load(Ordering::SeqCst) {
                    return;
                }
                let status = value & (regs::IrqStatus::STARTED | regs::IrqStatus::STOPPED).bits();
                let hw = Arc::clone(&self.0);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(2));
                    hw.raise(status);
                });
            }
            regs::FB_BASE => {
                self.0.regs.write32(offset, value);
                locked(&self.0.events).push(Event::FbBase(value));
            }
            _ => self.0.regs.write32(offset, value),
        }
    }
}

pub struct FakeInterrupts {
    hw: Arc<Hardware>,
    fail: bool,
}

impl InterruptController for FakeInterrupts {
    fn setup(&self, line: IrqLine, handler: Arc<dyn InterruptHandler>) -> Result<IrqCookie, HalError> {
        if self.fail {
            return Err(HalError::IrqSetupFailed);
        }
        *locked(&self.hw.handler) = Some(handler);
        locked(&self.hw.events).push(Event::SetupIrq);
        Ok(IrqCookie(line.0 as usize))
    }

    fn teardown(&self, _cookie: IrqCookie) {
        locked(&self.hw.handler).take();
        locked(&self.hw.events).push(Event::TeardownIrq);
    }
}

pub struct FakeChild {
    events: EventLog,
    fail: bool,
    attached: bool,
}

impl FakeChild {
    pub fn attached(&self) -> bool {
        self.attached
    }
}

impl DisplayConsumer for FakeChild {
    fn attach(&mut self, info: &FramebufferInfo) -> Result<(), HalError> {
        if self.fail {
            return Err(HalError::ChildRejected);
        }
        self.attached = true;
        locked(&self.events).push(Event::ChildAttach(info.name.clone()));
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
        locked(&self.events).push(Event::ChildDetach);
    }
}

pub struct FakePlatform {
    hw: Arc<Hardware>,
    interrupts: FakeInterrupts,
    properties: MapProperties,
    allocator: TrackingAllocator,
    fail: Option<FailPoint>,
    events: EventLog,
}

impl FakePlatform {
    pub fn new(panel: PanelConfig) -> Self {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let hw = Arc::new(Hardware {
            regs: RecordingRegs::new(),
            handler: Mutex::new(None),
            silent: AtomicBool::new(false),
            events: Arc::clone(&events),
        });
        Self {
            interrupts: FakeInterrupts {
                hw: Arc::clone(&hw),
                fail: false,
            },
            hw,
            properties: MapProperties::from_config(&panel),
            allocator: TrackingAllocator {
                events: Some(Arc::clone(&events)),
                ..TrackingAllocator::new()
            },
            fail: None,
            events,
        }
    }

    pub fn failing(mut self, point: FailPoint) -> Self {
        self.fail = Some(point);
        self.interrupts.fail = point == FailPoint::SetupIrq;
        self.allocator.fail = point == FailPoint::Allocate;
        self
    }

    /// Hardware never raises an interrupt.
    pub fn silent(self) -> Self {
        self.set_silent(true);
        self
    }

    pub fn set_silent(&self, silent: bool) {
        self.hw.silent.store(silent, Ordering::SeqCst);
    }

    pub fn without_property(mut self, name: &str) -> Self {
        self.properties.remove(name);
        self
    }

    pub fn hw(&self) -> &Hardware {
        &self.hw
    }

    pub fn events(&self) -> Vec<Event> {
        locked(&self.events).clone()
    }

    pub fn clear_events(&self) {
        locked(&self.events).clear();
    }

    pub fn handler_installed(&self) -> bool {
        locked(&self.hw.handler).is_some()
    }

    pub fn live_allocations(&self) -> usize {
        self.allocator.live()
    }

    /// Every acquisition in the event log has its matching release.
    pub fn balanced(&self) -> bool {
        let events = self.events();
        let count = |f: fn(&Event) -> bool| events.iter().filter(|e| f(e)).count();
        count(|e| *e == Event::MapRegisters) == count(|e| *e == Event::UnmapRegisters)
            && count(|e| *e == Event::AllocateIrq) == count(|e| *e == Event::ReleaseIrq)
            && count(|e| *e == Event::SetupIrq) == count(|e| *e == Event::TeardownIrq)
            && count(|e| matches!(e, Event::Allocate(_))) == count(|e| matches!(e, Event::Free(_)))
            && count(|e| *e == Event::AddChild) == count(|e| *e == Event::DeleteChild)
            && count(|e| matches!(e, Event::ChildAttach(_))) == count(|e| *e == Event::ChildDetach)
    }

    fn log(&self, event: Event) {
        locked(&self.events).push(event);
    }

    fn fails_at(&self, point: FailPoint) -> bool {
        self.fail == Some(point)
    }
}

impl Platform for FakePlatform {
    type Registers = FakeRegs;
    type Properties = MapProperties;
    type Allocator = TrackingAllocator;
    type Interrupts = FakeInterrupts;
    type Child = FakeChild;
    type Wait = StdWaitQueue;

    fn name_unit(&self) -> &str {
        "dso100fb0"
    }

    fn map_registers(&self) -> Result<FakeRegs, HalError> {
        if self.fails_at(FailPoint::MapRegisters) {
            return Err(HalError::RegistersUnavailable);
        }
        self.log(Event::MapRegisters);
        Ok(FakeRegs(Arc::clone(&self.hw)))
    }

    fn unmap_registers(&self, _regs: FakeRegs) {
        self.log(Event::UnmapRegisters);
    }

    fn allocate_irq(&self) -> Result<IrqLine, HalError> {
        if self.fails_at(FailPoint::AllocateIrq) {
            return Err(HalError::IrqUnavailable);
        }
        self.log(Event::AllocateIrq);
        Ok(IrqLine(FAKE_IRQ))
    }

    fn release_irq(&self, _line: IrqLine) {
        self.log(Event::ReleaseIrq);
    }

    fn interrupts(&self) -> &FakeInterrupts {
        &self.interrupts
    }

    fn properties(&self) -> &MapProperties {
        &self.properties
    }

    fn allocator(&self) -> &TrackingAllocator {
        &self.allocator
    }

    fn wait_queue(&self) -> StdWaitQueue {
        StdWaitQueue::new()
    }

    fn add_child(&self) -> Result<FakeChild, HalError> {
        if self.fails_at(FailPoint::AddChild) {
            return Err(HalError::ChildUnavailable);
        }
        self.log(Event::AddChild);
        Ok(FakeChild {
            events: Arc::clone(&self.events),
            fail: self.fails_at(FailPoint::ChildAttach),
            attached: false,
        })
    }

    fn delete_child(&self, _child: FakeChild) {
        self.log(Event::DeleteChild);
    }
}
