#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use anyhow::Result;
use clap::Parser;
use tracing::info;

use burble_gatts::att::Handle;
use burble_gatts::gatts::*;

#[derive(Clone, Copy, Debug, clap::Parser)]
struct Args {
    /// Number of heart rate measurements to send.
    #[arg(short, long, default_value_t = 5)]
    beats: u8,

    /// Subscribe to indications instead of notifications.
    #[arg(short, long)]
    indicate: bool,

    /// Validate prepared write offsets.
    #[arg(short, long)]
    strict: bool,

    /// Reject execute requests if the authorization reply fails.
    #[arg(long)]
    abort_on_reply_failure: bool,
}

/// Driver that logs every call instead of talking to a controller.
#[derive(Debug, Default)]
struct LogDriver {
    replies: usize,
}

impl Driver for LogDriver {
    fn value_set(&mut self, hdl: Handle, val: &[u8]) -> std::result::Result<(), DriverError> {
        info!("value_set {hdl} {val:02X?}");
        Ok(())
    }

    fn authorize_reply(
        &mut self,
        conn: ConnHandle,
        rsp: &AuthReply<'_>,
    ) -> std::result::Result<(), DriverError> {
        self.replies += 1;
        info!(
            "authorize_reply {conn} {:?} status={:#06X} update={} off={}",
            rsp.kind,
            rsp.status.raw(),
            rsp.update,
            rsp.off
        );
        Ok(())
    }

    fn hvx(&mut self, conn: ConnHandle, hvx: &Hvx<'_>) -> std::result::Result<(), DriverError> {
        info!("hvx {conn} {} {} {:02X?}", hvx.kind, hvx.hdl, hvx.data);
        Ok(())
    }
}

/// Returns the `i`th heart rate measurement with an 8-bit BPM value.
const fn measurement(i: u8) -> [u8; 2] {
    [0x00, 60_u8.saturating_add(i)]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let cfg = Config {
        strict_prepared_writes: args.strict,
        reply_failure: if args.abort_on_reply_failure {
            ReplyFailure::Abort
        } else {
            ReplyFailure::Ignore
        },
        ..Config::default()
    };
    let mut db = Db::with_config(LogDriver::default(), cfg);

    let hrs = db.add_service(0x180D_u16, ServiceType::Primary)?;
    let hrm = CharSpec::new(CharProps::NOTIFY.union(CharProps::INDICATE)).max_len(8);
    let hrm = db.add_characteristic(hrs, 0x2A37_u16, hrm, &[0x00, 0x00])?;
    hrm.on_subscription_change(|ctx, s| {
        println!("Heart rate subscription: {s}");
        if s.is_subscribed() {
            if let Err(e) = ctx.set_value(&[0x00, 60], true) {
                println!("Failed to send initial measurement: {e}");
            }
        }
    });
    let (hrm, cccd) = (hrm.value_handle(), hrm.cccd_handle().unwrap_or(Handle::MAX));

    let loc = CharSpec::new(CharProps::READ).fixed_len(1);
    let loc = db.add_characteristic(hrs, 0x2A38_u16, loc, &[0x01])?;
    let mut reads = 0_u8;
    loc.on_read(move |ctx| {
        reads = reads.wrapping_add(1);
        if let Err(e) = ctx.set_value(&[reads % 7], false) {
            println!("Failed to update sensor location: {e}");
        }
    });
    let loc = loc.value_handle();

    let name = CharSpec::new(CharProps::READ | CharProps::WRITE).max_len(64);
    let name = db.add_characteristic(hrs, "6E400002-B5A3-F393-E0A9-E50E24DCCA9E", name, b"")?;
    name.on_write(|ctx| println!("Name written: {:?}", String::from_utf8_lossy(ctx.value())));
    let name = name.value_handle();
    db.dump();

    let conn = ConnHandle(0x0040);
    db.handle_event(Event::Connected { conn })?;
    let cccd_val = if args.indicate { Cccd::INDICATE } else { Cccd::NOTIFY };
    db.handle_event(Event::Write {
        conn,
        hdl: cccd,
        off: 0,
        data: &cccd_val.bits().to_le_bytes(),
    })?;

    for i in 0..args.beats {
        db.set_value(hrm, &measurement(i), true)?;
    }

    let read = |hdl, off| Event::ReadAuthorize { conn, hdl, off };
    db.handle_event(read(loc, 0))?;
    db.handle_event(read(loc, 2))?;

    for (off, chunk) in [(0, "Blackrock "), (10, "heart rate "), (21, "monitor")] {
        let req = WriteAuth::new(name, WriteOp::PrepareWriteReq, off, chunk.as_bytes());
        db.dispatch_write_authorization(conn, &req)?;
    }
    db.dispatch_write_authorization(conn, &WriteAuth::exec())?;

    db.handle_event(Event::Disconnected { conn, reason: 0x13 })?;
    db.dump();
    println!("Sent {} authorization replies", db.driver().replies);
    Ok(())
}
