use std::cell::RefCell;
use std::rc::Rc;

use matches::assert_matches;

use crate::att::{ErrorCode, Handle};

use super::*;

const CONN: ConnHandle = ConnHandle(0x0040);

type Log = Rc<RefCell<Vec<Call>>>;

/// Driver call or observer event, in the order they happened.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Call {
    ValueSet(Handle, Vec<u8>),
    Reply {
        kind: AuthKind,
        status: Status,
        update: bool,
        off: u16,
        data: Option<Vec<u8>>,
    },
    Hvx(HvxKind, Handle, Vec<u8>),
    Write(Vec<u8>),
    Sub(SubscriptionState),
    Read,
}

#[derive(Debug, Default)]
struct Mock {
    log: Log,
    fail_reply: bool,
    fail_value_set: bool,
}

impl Driver for Mock {
    fn value_set(&mut self, hdl: Handle, val: &[u8]) -> std::result::Result<(), DriverError> {
        if self.fail_value_set {
            return Err(DriverError(0x3001));
        }
        self.log.borrow_mut().push(Call::ValueSet(hdl, val.to_vec()));
        Ok(())
    }

    fn authorize_reply(
        &mut self,
        conn: ConnHandle,
        rsp: &AuthReply<'_>,
    ) -> std::result::Result<(), DriverError> {
        assert_eq!(conn, CONN);
        self.log.borrow_mut().push(Call::Reply {
            kind: rsp.kind,
            status: rsp.status,
            update: rsp.update,
            off: rsp.off,
            data: rsp.data.map(<[u8]>::to_vec),
        });
        if self.fail_reply {
            return Err(DriverError(0x13));
        }
        Ok(())
    }

    fn hvx(&mut self, conn: ConnHandle, hvx: &Hvx<'_>) -> std::result::Result<(), DriverError> {
        assert_eq!(conn, CONN);
        (self.log.borrow_mut()).push(Call::Hvx(hvx.kind, hvx.hdl, hvx.data.to_vec()));
        Ok(())
    }
}

/// Heart rate service with a notifiable characteristic `a` (max 8 bytes) and a
/// read/write characteristic `b` (max 4 bytes, initially `[1, 2]`).
struct Fixture {
    db: Db<Mock>,
    log: Log,
    svc: Handle,
    a: Handle,
    cccd: Handle,
    b: Handle,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(cfg: Config) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let log = Log::default();
        let drv = Mock {
            log: Rc::clone(&log),
            ..Mock::default()
        };
        let mut db = Db::with_config(drv, cfg);
        let svc = db.add_service(0x180D_u16, ServiceType::Primary).unwrap();
        let props = CharProps::READ | CharProps::WRITE | CharProps::NOTIFY | CharProps::INDICATE;
        let a = (db.add_characteristic(svc, 0x2A37_u16, CharSpec::new(props).max_len(8), &[]))
            .unwrap();
        observe(a, &log);
        let (a, cccd) = (a.value_handle(), a.cccd_handle().unwrap());
        let spec = CharSpec::new(CharProps::READ | CharProps::WRITE).max_len(4);
        let b = db.add_characteristic(svc, 0x2A38_u16, spec, &[1, 2]).unwrap();
        observe(b, &log);
        let b = b.value_handle();
        db.handle_event(Event::Connected { conn: CONN }).unwrap();
        assert!(log.borrow().is_empty());
        Self {
            db,
            log,
            svc,
            a,
            cccd,
            b,
        }
    }

    /// Returns and clears all recorded calls.
    fn calls(&self) -> Vec<Call> {
        self.log.take()
    }

    fn value(&self, hdl: Handle) -> &[u8] {
        self.db.characteristic(hdl).unwrap().value()
    }

    fn sub(&self) -> SubscriptionState {
        self.db.characteristic(self.a).unwrap().subscription()
    }

    fn write(&mut self, hdl: Handle, data: &[u8]) {
        let evt = Event::Write {
            conn: CONN,
            hdl,
            off: 0,
            data,
        };
        self.db.handle_event(evt).unwrap();
    }

    fn write_auth(&mut self, hdl: Handle, op: WriteOp, off: u16, data: &[u8]) -> Result<()> {
        let req = WriteAuth::new(hdl, op, off, data);
        (self.db).handle_event(Event::WriteAuthorize { conn: CONN, req })
    }

    fn prepare(&mut self, hdl: Handle, off: u16, data: &[u8]) {
        (self.write_auth(hdl, WriteOp::PrepareWriteReq, off, data)).unwrap();
    }

    fn exec(&mut self, req: WriteAuth<'_>) -> Result<()> {
        (self.db).handle_event(Event::WriteAuthorize { conn: CONN, req })
    }

    fn read(&mut self, hdl: Handle, off: u16) {
        let evt = Event::ReadAuthorize {
            conn: CONN,
            hdl,
            off,
        };
        self.db.handle_event(evt).unwrap();
    }
}

fn observe(c: &mut Characteristic, log: &Log) {
    let (w, s) = (Rc::clone(log), Rc::clone(log));
    c.on_write(move |ctx| w.borrow_mut().push(Call::Write(ctx.value().to_vec())))
        .on_subscription_change(move |_, st| s.borrow_mut().push(Call::Sub(st)));
}

fn hdl(v: u16) -> Handle {
    Handle::new(v).unwrap()
}

fn write_reply(status: Status, off: u16, data: Vec<u8>) -> Call {
    Call::Reply {
        kind: AuthKind::Write,
        status,
        update: status.is_success(),
        off,
        data: Some(data),
    }
}

fn exec_reply(status: Status) -> Call {
    Call::Reply {
        kind: AuthKind::Write,
        status,
        update: false,
        off: 0,
        data: None,
    }
}

fn read_reply(status: Status, off: u16) -> Call {
    Call::Reply {
        kind: AuthKind::Read,
        status,
        update: false,
        off,
        data: None,
    }
}

#[test]
fn registration() {
    let mut t = Fixture::new();
    let s = &t.db.services()[0];
    assert_eq!(s.handle(), hdl(1));
    assert_eq!(s.uuid(), Uuid::from_u16(0x180D).unwrap());
    assert_eq!(s.typ(), ServiceType::Primary);
    assert_eq!((s.handle_range().start(), s.handle_range().end()), (hdl(1), hdl(6)));
    let c: Vec<_> = s.characteristics().iter().map(Characteristic::handles).collect();
    assert_eq!(
        c,
        [
            CharHandles {
                decl: hdl(2),
                value: hdl(3),
                cccd: Some(hdl(4)),
            },
            CharHandles {
                decl: hdl(5),
                value: hdl(6),
                cccd: None,
            },
        ]
    );
    assert_eq!(t.db.characteristic(t.cccd).unwrap().value_handle(), t.a);
    assert!(t.db.characteristic(hdl(5)).is_none());
    assert_eq!(t.value(t.b), &[1, 2]);

    let spec = CharSpec::new(CharProps::READ);
    assert_matches!(
        t.db.add_characteristic(hdl(100), 0x2A39_u16, spec, &[]),
        Err(Error::Registration(RegistrationError::UnknownService(_)))
    );
    assert_matches!(
        t.db.add_characteristic(t.svc, "2A3G", spec, &[]),
        Err(Error::Registration(RegistrationError::InvalidUuid(_)))
    );
    assert_matches!(
        t.db.add_characteristic(t.svc, 0x2A39_u16, spec.max_len(0), &[]),
        Err(Error::Registration(RegistrationError::InvalidMaxLen(0)))
    );
    assert_matches!(
        t.db.add_characteristic(t.svc, 0x2A39_u16, spec.max_len(2), &[1, 2, 3]),
        Err(Error::ValueTooLong { len: 3, max: 2 })
    );

    let vendor = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E";
    let s2 = t.db.add_service(vendor, ServiceType::Secondary).unwrap();
    assert_eq!(s2, hdl(7));
    assert_matches!(
        t.db.add_characteristic(t.svc, 0x2A39_u16, spec, &[]),
        Err(Error::Registration(RegistrationError::ServiceClosed(_)))
    );
    let c = t.db.add_characteristic(s2, Uuid::from_u16(0x2A39).unwrap(), spec, &[]);
    assert_eq!(c.unwrap().handles().decl, hdl(8));
    let s2 = &t.db.services()[1];
    assert_eq!(s2.typ(), ServiceType::Secondary);
    assert_eq!(s2.handle_range().end(), hdl(9));
    assert_eq!(t.db.characteristics().count(), 3);
    t.db.dump();
    assert!(t.calls().is_empty());
}

#[test]
fn set_value() {
    let mut t = Fixture::new();
    t.db.set_value(t.b, &[5, 6, 7], false).unwrap();
    assert_eq!(t.value(t.b), &[5, 6, 7]);
    t.read(t.b, 0);
    assert_eq!(
        t.calls(),
        [
            Call::ValueSet(t.b, vec![5, 6, 7]),
            read_reply(Status::Success, 0)
        ]
    );

    // Maximum length
    t.db.set_value(t.b, &[1, 2, 3, 4], false).unwrap();
    assert_eq!(t.value(t.b), &[1, 2, 3, 4]);
    t.db.set_value(t.b, &[], false).unwrap();
    assert!(t.value(t.b).is_empty());
    t.calls();

    assert_eq!(
        t.db.set_value(t.cccd, &[1], false),
        Err(Error::InvalidHandle(t.cccd))
    );
    assert_eq!(
        t.db.set_value(hdl(5), &[1], false),
        Err(Error::InvalidHandle(hdl(5)))
    );
}

#[test]
fn set_value_too_long() {
    let mut t = Fixture::new();
    assert_eq!(
        t.db.set_value(t.b, &[1, 2, 3, 4, 5], false),
        Err(Error::ValueTooLong { len: 5, max: 4 })
    );
    assert_eq!(t.value(t.b), &[1, 2]);
    assert!(t.calls().is_empty());
}

#[test]
fn set_value_not_notifiable() {
    let mut t = Fixture::new();
    assert_matches!(
        t.db.set_value(t.b, &[3], true),
        Err(Error::NotNotifiable(u)) if u == Uuid::from_u16(0x2A38).unwrap()
    );
    assert_eq!(t.value(t.b), &[1, 2]);
    assert!(t.calls().is_empty());
}

#[test]
fn set_value_driver_error() {
    let mut t = Fixture::new();
    t.db.driver_mut().fail_value_set = true;
    assert_eq!(
        t.db.set_value(t.b, &[3], false),
        Err(Error::Driver(DriverError(0x3001)))
    );
    assert_eq!(t.value(t.b), &[1, 2]);
}

#[test]
fn indicate() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x02, 0x00]);
    assert_eq!(t.sub(), SubscriptionState::Indicate);
    t.db.set_value(t.a, &[0x06, 0x48], true).unwrap();
    assert_eq!(
        t.calls(),
        [
            Call::Sub(SubscriptionState::Indicate),
            Call::ValueSet(t.a, vec![0x06, 0x48]),
            Call::Hvx(HvxKind::Indication, t.a, vec![0x06, 0x48]),
        ]
    );

    // Without notify
    t.db.set_value(t.a, &[0x06, 0x49], false).unwrap();
    assert_eq!(t.calls(), [Call::ValueSet(t.a, vec![0x06, 0x49])]);
}

#[test]
fn notify() {
    let mut t = Fixture::new();
    t.db.set_value(t.a, &[1], true).unwrap();
    assert_eq!(t.calls(), [Call::ValueSet(t.a, vec![1])]);

    t.write(t.cccd, &[0x01, 0x00]);
    t.db.set_value(t.a, &[2], true).unwrap();
    assert_eq!(
        t.calls(),
        [
            Call::Sub(SubscriptionState::Notify),
            Call::ValueSet(t.a, vec![2]),
            Call::Hvx(HvxKind::Notification, t.a, vec![2]),
        ]
    );

    t.write(t.cccd, &[0x00, 0x00]);
    t.db.set_value(t.a, &[3], true).unwrap();
    assert_eq!(
        t.calls(),
        [
            Call::Sub(SubscriptionState::NotSubscribed),
            Call::ValueSet(t.a, vec![3]),
        ]
    );
}

#[test]
fn cccd_both_bits() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x03, 0x00]);
    assert_eq!(t.sub(), SubscriptionState::Indicate);

    let mut t = Fixture::with_config(Config {
        prefer_indications: false,
        ..Config::default()
    });
    t.write(t.cccd, &[0x03, 0x00]);
    assert_eq!(t.sub(), SubscriptionState::Notify);
}

#[test]
fn disconnect_resets_subscription() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x02, 0x00]);
    assert!(t.db.characteristic(t.a).unwrap().is_subscribed());
    t.calls();
    let evt = Event::Disconnected {
        conn: CONN,
        reason: 0x13,
    };
    t.db.handle_event(evt).unwrap();
    assert_eq!(t.db.connection(), None);
    assert_eq!(t.sub(), SubscriptionState::NotSubscribed);
    assert!(t.calls().is_empty());

    // No peer to notify
    t.db.set_value(t.a, &[1], true).unwrap();
    assert_eq!(t.calls(), [Call::ValueSet(t.a, vec![1])]);
}

#[test]
fn write_auth_too_long() {
    let mut t = Fixture::new();
    t.write_auth(t.b, WriteOp::WriteReq, 2, &[7, 8, 9]).unwrap();
    t.write_auth(t.b, WriteOp::PrepareWriteReq, 4, &[7]).unwrap();
    let st = Status::Att(ErrorCode::InvalidAttributeValueLength);
    assert_eq!(
        t.calls(),
        [write_reply(st, 2, vec![7, 8, 9]), write_reply(st, 4, vec![7])]
    );
    assert_eq!(t.value(t.b), &[1, 2]);
    assert!(!t.db.characteristic(t.b).unwrap().has_pending_write());
}

#[test]
fn write_auth_immediate() {
    let mut t = Fixture::new();
    t.write_auth(t.b, WriteOp::WriteReq, 0, &[9, 9]).unwrap();
    assert_eq!(t.value(t.b), &[9, 9]);
    t.write_auth(t.b, WriteOp::WriteCmd, 0, &[8]).unwrap();
    assert_eq!(t.value(t.b), &[8]);
    t.write_auth(t.b, WriteOp::SignedWriteCmd, 0, &[7]).unwrap();
    assert_eq!(t.value(t.b), &[7]);
    assert_eq!(
        t.calls(),
        [
            write_reply(Status::Success, 0, vec![9, 9]),
            Call::Write(vec![9, 9]),
            write_reply(Status::Success, 0, vec![8]),
            Call::Write(vec![8]),
            write_reply(Status::Success, 0, vec![7]),
            Call::Write(vec![7]),
        ]
    );
}

#[test]
fn write_auth_cccd() {
    let mut t = Fixture::new();
    t.write_auth(t.cccd, WriteOp::WriteReq, 0, &[0x01, 0x00]).unwrap();
    t.write_auth(t.cccd, WriteOp::WriteReq, 0, &[0x01, 0x00, 0x00]).unwrap();
    t.write_auth(t.cccd, WriteOp::PrepareWriteReq, 0, &[0x02]).unwrap();
    assert_eq!(
        t.calls(),
        [
            write_reply(Status::Success, 0, vec![0x01, 0x00]),
            Call::Sub(SubscriptionState::Notify),
            write_reply(
                ErrorCode::InvalidAttributeValueLength.into(),
                0,
                vec![0x01, 0x00, 0x00]
            ),
            write_reply(ErrorCode::RequestNotSupported.into(), 0, vec![0x02]),
        ]
    );
    assert_eq!(t.sub(), SubscriptionState::Notify);
}

#[test]
fn direct_write() {
    let mut t = Fixture::new();
    t.write(t.b, &[4, 3, 2]);
    assert_eq!(t.value(t.b), &[4, 3, 2]);
    // Oversized writes are dropped
    t.write(t.b, &[0; 5]);
    assert_eq!(t.value(t.b), &[4, 3, 2]);
    // Unowned handles are ignored
    t.write(hdl(5), &[1]);
    t.write(hdl(99), &[1]);
    assert_eq!(t.calls(), [Call::Write(vec![4, 3, 2])]);
}

#[test]
fn prepared_write_execute() {
    let mut t = Fixture::new();
    t.prepare(t.a, 0, b"abc");
    t.prepare(t.a, 3, b"de");
    assert!(t.db.characteristic(t.a).unwrap().has_pending_write());
    assert_eq!(t.value(t.a), b"");
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(
        t.calls(),
        [
            write_reply(Status::Success, 0, b"abc".to_vec()),
            write_reply(Status::Success, 3, b"de".to_vec()),
            exec_reply(Status::Success),
            Call::ValueSet(t.a, b"abcde".to_vec()),
            Call::Write(b"abcde".to_vec()),
        ]
    );
    assert_eq!(t.value(t.a), b"abcde");
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
}

#[test]
fn prepared_write_cancel() {
    let mut t = Fixture::new();
    t.prepare(t.a, 0, b"abc");
    t.prepare(t.a, 3, b"de");
    t.calls();
    t.exec(WriteAuth::cancel()).unwrap();
    assert_eq!(t.calls(), [exec_reply(Status::Success)]);
    assert_eq!(t.value(t.a), b"");
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());

    // Nothing left to execute
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.calls(), [exec_reply(Status::Success)]);
}

#[test]
fn prepared_write_across_services() {
    let mut t = Fixture::new();
    let s2 = t.db.add_service(0x180F_u16, ServiceType::Primary).unwrap();
    let spec = CharSpec::new(CharProps::READ | CharProps::WRITE);
    let c = t.db.add_characteristic(s2, 0x2A19_u16, spec, &[]).unwrap();
    observe(c, &t.log);
    let c = c.value_handle();

    t.prepare(t.b, 0, &[1]);
    t.prepare(c, 0, &[2, 3]);
    t.prepare(t.b, 1, &[4]);
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(
        t.calls(),
        [
            exec_reply(Status::Success),
            Call::ValueSet(t.b, vec![1, 4]),
            Call::Write(vec![1, 4]),
            Call::ValueSet(c, vec![2, 3]),
            Call::Write(vec![2, 3]),
        ]
    );
    assert_eq!(t.value(t.b), &[1, 4]);
    assert_eq!(t.value(c), &[2, 3]);
}

#[test]
fn prepared_write_arrival_order() {
    let mut t = Fixture::new();
    t.prepare(t.a, 3, b"de");
    t.prepare(t.a, 0, b"abc");
    t.exec(WriteAuth::exec()).unwrap();
    // Offsets are not used for placement
    assert_eq!(t.value(t.a), b"deabc");
}

#[test]
fn prepared_write_too_long() {
    let mut t = Fixture::new();
    t.prepare(t.a, 0, b"abcdef");
    t.prepare(t.a, 0, b"ghijkl");
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.calls(), [exec_reply(Status::Success)]);
    assert_eq!(t.value(t.a), b"");
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
}

#[test]
fn strict_prepared_write() {
    let cfg = Config {
        strict_prepared_writes: true,
        ..Config::default()
    };
    let mut t = Fixture::with_config(cfg);
    t.prepare(t.a, 0, b"abc");
    t.prepare(t.a, 3, b"de");
    t.prepare(t.b, 0, &[1]);
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.value(t.a), b"abcde");
    assert_eq!(t.value(t.b), &[1]);

    // Out of order
    t.prepare(t.b, 0, &[5]);
    t.prepare(t.a, 3, b"de");
    t.prepare(t.a, 0, b"abc");
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(
        t.calls(),
        [exec_reply(ErrorCode::InvalidOffset.into())]
    );
    assert_eq!(t.value(t.a), b"abcde");
    assert_eq!(t.value(t.b), &[1]);
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
    assert!(!t.db.characteristic(t.b).unwrap().has_pending_write());

    // Too long
    t.prepare(t.a, 0, b"abcdef");
    t.prepare(t.a, 6, b"gh");
    t.prepare(t.a, 8, b"");
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.value(t.a), b"abcdefgh");
    t.prepare(t.a, 0, b"abcdef");
    t.prepare(t.a, 0, b"ghijkl");
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(
        t.calls(),
        [exec_reply(ErrorCode::InvalidOffset.into())]
    );
}

#[test]
fn read_auth() {
    let mut t = Fixture::new();
    let n = Rc::new(RefCell::new(0));
    let m = Rc::clone(&n);
    (t.db.characteristic_mut(t.b).unwrap()).on_read(move |_| *m.borrow_mut() += 1);
    t.read(t.b, 3);
    t.read(t.b, 2);
    t.read(t.b, 1);
    assert_eq!(*n.borrow(), 0);
    t.read(t.b, 0);
    assert_eq!(*n.borrow(), 1);
    assert_eq!(
        t.calls(),
        [
            read_reply(ErrorCode::InvalidOffset.into(), 3),
            read_reply(Status::Success, 2),
            read_reply(Status::Success, 1),
            read_reply(Status::Success, 0),
        ]
    );
}

#[test]
fn read_callback_updates_value() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x01, 0x00]);
    let log = Rc::clone(&t.log);
    (t.db.characteristic_mut(t.a).unwrap()).on_read(move |ctx| {
        log.borrow_mut().push(Call::Read);
        assert_eq!(ctx.conn(), CONN);
        ctx.set_value(&[0x42], true).unwrap();
        assert_eq!(ctx.value(), &[0x42]);
    });
    t.calls();
    t.read(t.a, 0);
    assert_eq!(
        t.calls(),
        [
            Call::Read,
            Call::ValueSet(t.a, vec![0x42]),
            read_reply(Status::Success, 0),
        ]
    );
    assert_eq!(t.value(t.a), &[0x42]);

    // Notifications resume after the read
    t.db.set_value(t.a, &[0x43], true).unwrap();
    assert_eq!(
        t.calls(),
        [
            Call::ValueSet(t.a, vec![0x43]),
            Call::Hvx(HvxKind::Notification, t.a, vec![0x43]),
        ]
    );
}

#[test]
fn read_callback_replaced() {
    let mut t = Fixture::new();
    let log = Rc::clone(&t.log);
    let c = t.db.characteristic_mut(t.b).unwrap();
    c.on_read(|_| panic!("replaced callback called"));
    c.on_read(move |ctx| {
        let v = ctx.set_value(&[0; 5], false);
        assert_matches!(v, Err(Error::ValueTooLong { .. }));
        log.borrow_mut().push(Call::Read);
    });
    t.read(t.b, 0);
    assert_eq!(t.calls(), [Call::Read, read_reply(Status::Success, 0)]);
    assert_eq!(t.value(t.b), &[1, 2]);
}

#[test]
fn multiple_observers() {
    let mut t = Fixture::new();
    let n = Rc::new(RefCell::new(Vec::new()));
    let m = Rc::clone(&n);
    (t.db.characteristic_mut(t.a).unwrap())
        .on_subscription_change(move |_, s| m.borrow_mut().push(s));
    t.write(t.cccd, &[0x02, 0x00]);
    assert_eq!(t.calls(), [Call::Sub(SubscriptionState::Indicate)]);
    assert_eq!(*n.borrow(), [SubscriptionState::Indicate]);
}

#[test]
fn reply_failure_ignore() {
    let mut t = Fixture::new();
    t.db.driver_mut().fail_reply = true;
    t.write_auth(t.b, WriteOp::WriteReq, 0, &[3]).unwrap();
    assert_eq!(t.value(t.b), &[3]);
    t.prepare(t.a, 0, b"x");
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.value(t.a), b"x");
}

#[test]
fn reply_failure_abort() {
    let mut t = Fixture::with_config(Config {
        reply_failure: ReplyFailure::Abort,
        ..Config::default()
    });
    t.db.driver_mut().fail_reply = true;
    let err = Err(Error::Driver(DriverError(0x13)));
    assert_eq!(t.write_auth(t.b, WriteOp::WriteReq, 0, &[3]), err);
    assert_eq!(t.value(t.b), &[1, 2]);
    assert_eq!(
        t.write_auth(t.a, WriteOp::PrepareWriteReq, 0, b"x"),
        err
    );
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
    assert_eq!(t.calls().len(), 2);

    // Execute is not committed when its reply fails
    t.db.driver_mut().fail_reply = false;
    t.prepare(t.a, 0, b"x");
    t.db.driver_mut().fail_reply = true;
    assert_eq!(t.exec(WriteAuth::exec()), err);
    assert_eq!(t.value(t.a), b"");
}

#[test]
fn no_connection() {
    let mut t = Fixture::new();
    let other = ConnHandle(0x0041);
    let req = WriteAuth::new(t.b, WriteOp::WriteReq, 0, &[3]);
    t.db.handle_event(Event::WriteAuthorize { conn: other, req }).unwrap();
    let evt = Event::ReadAuthorize {
        conn: other,
        hdl: t.b,
        off: 0,
    };
    t.db.handle_event(evt).unwrap();
    let evt = Event::Disconnected {
        conn: other,
        reason: 0x13,
    };
    t.db.handle_event(evt).unwrap();
    assert_eq!(t.db.connection(), Some(CONN));

    let evt = Event::Disconnected {
        conn: CONN,
        reason: 0x13,
    };
    t.db.handle_event(evt).unwrap();
    t.db.dispatch_write_authorization(CONN, &WriteAuth::exec()).unwrap();
    assert!(t.calls().is_empty());
    assert_eq!(t.value(t.b), &[1, 2]);
}

#[test]
fn disconnect_discards_queue() {
    let mut t = Fixture::new();
    t.prepare(t.a, 0, b"abc");
    let evt = Event::Disconnected {
        conn: CONN,
        reason: 0x08,
    };
    t.db.handle_event(evt).unwrap();
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
    t.db.handle_event(Event::Connected { conn: CONN }).unwrap();
    t.calls();
    t.exec(WriteAuth::exec()).unwrap();
    assert_eq!(t.calls(), [exec_reply(Status::Success)]);
    assert_eq!(t.value(t.a), b"");
}

#[test]
fn reconnect_resets_state() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x02, 0x00]);
    t.prepare(t.a, 0, b"zz");
    t.calls();
    let other = ConnHandle(0x0041);
    t.db.handle_event(Event::Connected { conn: other }).unwrap();
    assert_eq!(t.db.connection(), Some(other));
    assert_eq!(t.sub(), SubscriptionState::NotSubscribed);
    assert!(!t.db.characteristic(t.a).unwrap().has_pending_write());
    t.db.set_value(t.a, &[7], true).unwrap();
    assert_eq!(t.calls(), [Call::ValueSet(t.a, vec![7])]);
}

#[test]
fn write_observer_notifies() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x01, 0x00]);
    (t.db.characteristic_mut(t.a).unwrap()).on_write(|ctx| {
        assert_eq!(ctx.conn(), CONN);
        assert_eq!(ctx.subscription(), SubscriptionState::Notify);
        if ctx.value() == b"ping" {
            ctx.set_value(b"pong", true).unwrap();
        }
    });
    t.calls();
    t.write_auth(t.a, WriteOp::WriteReq, 0, b"ping").unwrap();
    assert_eq!(
        t.calls(),
        [
            write_reply(Status::Success, 0, b"ping".to_vec()),
            Call::Write(b"ping".to_vec()),
            Call::ValueSet(t.a, b"pong".to_vec()),
            Call::Hvx(HvxKind::Notification, t.a, b"pong".to_vec()),
        ]
    );
    assert_eq!(t.value(t.a), b"pong");
}

#[test]
fn read_callback_unwind() {
    let mut t = Fixture::new();
    t.write(t.cccd, &[0x01, 0x00]);
    (t.db.characteristic_mut(t.a).unwrap()).on_read(|_| panic!("read failed"));
    let a = t.a;
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| t.read(a, 0)));
    assert!(r.is_err());
    t.calls();
    t.db.set_value(t.a, &[1], true).unwrap();
    assert_eq!(
        t.calls(),
        [
            Call::ValueSet(t.a, vec![1]),
            Call::Hvx(HvxKind::Notification, t.a, vec![1]),
        ]
    );
}
