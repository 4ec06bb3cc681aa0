//! Dual-channel audio capture: ADC0/ADC1 → ping-pong DMA → UART.
//!
//! Digitizes two analog inputs and streams them to the host as escaped
//! packets of raw 12-bit samples.
//!
//! Hardware: Raspberry Pi Pico (RP2040)
//!
//! | Signal | Pin |
//! |--------|-----|
//! | Left in | GPIO26 / ADC0 |
//! | Right in | GPIO27 / ADC1 |
//! | UART0 TX (3 Mbaud 8N1) | GPIO0 |
//! | UART0 RX (unused) | GPIO1 |
//! | Heartbeat | on-board LED |
//!
//! Data path:
//! ```text
//!   ADC round-robin ──► FIFO ──DREQ──► DMA ch0 ⇄ ch1 ──► buffer A / B
//!                                            │ DMA_IRQ_0
//!                                            ▼
//!                                      ready flags
//!                                            │ idle loop
//!                                            ▼
//!                                      UART0 ──► host
//! ```
//!
//! The two DMA channels chain to each other and wrap their write address,
//! so after `init` sampling never needs the CPU. The interrupt only flags
//! the finished buffer; the idle loop does all the encoding and the only
//! blocking work (UART writes). If the link falls behind, a buffer is
//! overwritten before it is sent and the overrun counter goes up.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

use kvm_audio::capture::PingPong;
use rp_pico::hal;

/// Capture statistics and heartbeat cadence, in sent packets (~1 s).
const STATS_INTERVAL: u32 = 375;

/// The capture buffers. Written by DMA, flagged by `DMA_IRQ_0`, drained by `idle`.
static BUFFERS: PingPong = PingPong::new();

type UartPins = (
    hal::gpio::Pin<hal::gpio::bank0::Gpio0, hal::gpio::FunctionUart, hal::gpio::PullNone>,
    hal::gpio::Pin<hal::gpio::bank0::Gpio1, hal::gpio::FunctionUart, hal::gpio::PullNone>,
);

type Uart = hal::uart::UartPeripheral<hal::uart::Enabled, hal::pac::UART0, UartPins>;

type Led = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {
    use super::{Led, Uart, BUFFERS, STATS_INTERVAL};

    use embedded_hal::digital::StatefulOutputPin;
    use hal::clocks::Clock;
    use hal::fugit::RateExtU32;
    use hal::pac;
    use hal::uart::{DataBits, StopBits, UartConfig, UartPeripheral};
    use rp_pico::hal;

    use kvm_audio::capture::dma::ADC_FIFO_ADDR;
    use kvm_audio::capture::{BufferId, CaptureLoop, DmaChain, SamplerConfig, Step, Transmitter};
    use kvm_audio::constants::{BAUD_RATE, SAMPLE_RATE_HZ};

    // ── RTIC resources ───────────────────────────────────────────────

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        dma: pac::DMA,
        chain: DmaChain,
        capture: CaptureLoop<'static, Uart>,
        led: Led,
    }

    // ── Init ─────────────────────────────────────────────────────────

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let mut device = cx.device;

        let mut watchdog = hal::Watchdog::new(device.WATCHDOG);
        let clocks = hal::clocks::init_clocks_and_plls(
            rp_pico::XOSC_CRYSTAL_FREQ,
            device.XOSC,
            device.CLOCKS,
            device.PLL_SYS,
            device.PLL_USB,
            &mut device.RESETS,
            &mut watchdog,
        )
        .ok()
        .expect("clock init");

        let sio = hal::Sio::new(device.SIO);
        let pins = rp_pico::Pins::new(device.IO_BANK0, device.PADS_BANK0, sio.gpio_bank0, &mut device.RESETS);

        let led: Led = pins.led.into_push_pull_output();

        // ── UART0 → host ────────────────────────────────────────────
        let uart_pins: super::UartPins = (pins.gpio0.reconfigure(), pins.gpio1.reconfigure());
        let uart = UartPeripheral::new(device.UART0, uart_pins, &mut device.RESETS)
            .enable(
                UartConfig::new(BAUD_RATE.Hz(), DataBits::Eight, None, StopBits::One),
                clocks.peripheral_clock.freq(),
            )
            .ok()
            .expect("UART0 enable");

        // ── Sampler configuration ───────────────────────────────────
        let sampler = SamplerConfig::with_adc_clock(
            clocks.adc_clock.freq().to_Hz(),
            SAMPLE_RATE_HZ,
            [0, 1],
        )
        .ok()
        .expect("sampler config");
        let chain = DmaChain::DEFAULT;

        let div = sampler.divider();
        defmt::info!(
            "sampling ADC{=u8} + ADC{=u8} at {=u32} Hz (div {=u16}+{=u8}/256, effective {=u32} Hz)",
            sampler.channels()[0],
            sampler.channels()[1],
            sampler.sample_rate_hz(),
            div.int,
            div.frac,
            sampler.effective_rate_hz()
        );

        // Powers the ADC and waits for it to be ready; registers are
        // programmed directly below.
        let _adc = hal::Adc::new(device.ADC, &mut device.RESETS);
        let _left = hal::adc::AdcPin::new(pins.gpio26.into_floating_input())
            .ok()
            .expect("GPIO26 as ADC0");
        let _right = hal::adc::AdcPin::new(pins.gpio27.into_floating_input())
            .ok()
            .expect("GPIO27 as ADC1");

        // ── DMA ch A ⇄ ch B ─────────────────────────────────────────
        device.RESETS.reset().modify(|_, w| w.dma().clear_bit());
        while device.RESETS.reset_done().read().dma().bit_is_clear() {}

        let dma = device.DMA;
        for id in BufferId::ALL {
            let ch = dma.ch(chain.channel(id) as usize);
            ch.ch_read_addr().write(|w| unsafe { w.bits(ADC_FIFO_ADDR) });
            ch.ch_write_addr()
                .write(|w| unsafe { w.bits(BUFFERS.dma_target(id) as u32) });
            ch.ch_trans_count()
                .write(|w| unsafe { w.bits(chain.transfer_count()) });
        }
        // B is armed without a trigger; A starts now and waits for DREQ.
        dma.ch(chain.channel(BufferId::B) as usize)
            .ch_al1_ctrl()
            .write(|w| unsafe { w.bits(chain.ctrl_word(BufferId::B)) });
        dma.ch(chain.channel(BufferId::A) as usize)
            .ch_ctrl_trig()
            .write(|w| unsafe { w.bits(chain.ctrl_word(BufferId::A)) });

        dma.ints0().write(|w| unsafe { w.bits(chain.irq_mask()) });
        dma.inte0().write(|w| unsafe { w.bits(chain.irq_mask()) });

        // ── ADC free-running round robin ────────────────────────────
        let adc = unsafe { &*pac::ADC::ptr() };
        adc.cs().write(|w| unsafe { w.bits(sampler.cs_idle_word()) });
        adc.fcs().write(|w| unsafe { w.bits(sampler.fcs_word()) });
        adc.div().write(|w| unsafe { w.bits(sampler.div_word()) });
        adc.cs().write(|w| unsafe { w.bits(sampler.cs_word()) });

        defmt::info!("capture running, UART0 at {=u32} baud", BAUD_RATE);

        let capture = CaptureLoop::new(&BUFFERS, Transmitter::new(uart));

        (
            Shared {},
            Local {
                dma,
                chain,
                capture,
                led,
            },
        )
    }

    // ── DMA ISR: flag the finished buffer ────────────────────────────

    #[task(binds = DMA_IRQ_0, local = [dma, chain], priority = 2)]
    fn dma_complete(cx: dma_complete::Context) {
        let dma = cx.local.dma;
        let ints = dma.ints0().read().bits();
        let ack = cx.local.chain.dispatch(ints, &BUFFERS);
        dma.ints0().write(|w| unsafe { w.bits(ack) });
    }

    // ── Idle: drain ready buffers to the UART ────────────────────────

    #[idle(local = [capture, led])]
    fn idle(cx: idle::Context) -> ! {
        let capture = cx.local.capture;
        let led = cx.local.led;
        let mut since_report = 0u32;

        loop {
            match capture.step() {
                Ok(Step::Idle) => continue,
                Ok(Step::Sent(_)) => {}
                Err(_) => {
                    defmt::warn!("UART write failed, packet dropped");
                    continue;
                }
            }

            since_report += 1;
            if since_report == STATS_INTERVAL {
                since_report = 0;
                led.toggle().ok();

                let stats = capture.buffers().stats();
                let tx = capture.transmitter();
                defmt::info!(
                    "completions A={=u32} B={=u32}, overruns={=u32}, sent={=u32}, substituted={=u32}",
                    stats.completions[0],
                    stats.completions[1],
                    stats.overruns,
                    tx.packets_sent(),
                    tx.substitutions()
                );
            }
        }
    }
}
