use time::{
    Date, Duration, PrimitiveDateTime, Time, UtcDateTime,
    format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{decode::DecodeError, value::Value};

// 2000-01-01, source: `from_julian_day` docs
const PG_EPOCH_JULIAN: i32 = 2_451_545;

const PG_EPOCH: Date = match Date::from_julian_day(PG_EPOCH_JULIAN) {
    Ok(ok) => ok,
    Err(_) => panic!("postgres epoch is a valid julian day"),
};

const PRIMITIVE_PG_EPOCH: PrimitiveDateTime = PrimitiveDateTime::new(PG_EPOCH, Time::MIDNIGHT);

const UTC_PG_EPOCH: UtcDateTime = UtcDateTime::new(PG_EPOCH, Time::MIDNIGHT);

/// `date` is days since postgres epoch, infinity saturates.
pub(crate) fn decode_date(days: i32) -> Value {
    let date = Date::from_julian_day(PG_EPOCH_JULIAN.saturating_add(days)).unwrap_or(if days < 0 {
        Date::MIN
    } else {
        Date::MAX
    });
    Value::Date(date)
}

/// `time` is microseconds since midnight.
pub(crate) fn decode_time(micros: i64) -> Result<Value, DecodeError> {
    if !(0..86_400_000_000).contains(&micros) {
        return Err(DecodeError::OutOfRange);
    }
    Ok(Value::Time(Time::MIDNIGHT + Duration::microseconds(micros)))
}

/// `timestamp` is microseconds since postgres epoch, infinity saturates.
pub(crate) fn decode_timestamp(micros: i64) -> Value {
    Value::Timestamp(PRIMITIVE_PG_EPOCH.saturating_add(Duration::microseconds(micros)))
}

/// `timestamptz` is microseconds since postgres epoch in UTC, infinity saturates.
pub(crate) fn decode_timestamptz(micros: i64) -> Value {
    Value::TimestampTz(UTC_PG_EPOCH.saturating_add(Duration::microseconds(micros)))
}

pub(crate) fn encode_date(date: Date) -> i32 {
    date.to_julian_day() - PG_EPOCH_JULIAN
}

pub(crate) fn encode_time(time: Time) -> i64 {
    (time - Time::MIDNIGHT).whole_microseconds() as i64
}

pub(crate) fn encode_timestamp(datetime: PrimitiveDateTime) -> i64 {
    clamp_micros((datetime - PRIMITIVE_PG_EPOCH).whole_microseconds())
}

pub(crate) fn encode_timestamptz(datetime: UtcDateTime) -> i64 {
    clamp_micros((datetime - UTC_PG_EPOCH).whole_microseconds())
}

fn clamp_micros(micros: i128) -> i64 {
    micros.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Text representation used when postgres type cannot accept binary value.
pub(crate) fn format_date(date: Date) -> String {
    date.format(DATE).unwrap_or_default()
}

pub(crate) fn format_time(time: Time) -> String {
    time.format(TIME).unwrap_or_default()
}

pub(crate) fn format_timestamp(datetime: PrimitiveDateTime) -> String {
    datetime.format(TIMESTAMP).unwrap_or_default()
}

pub(crate) fn format_timestamptz(datetime: UtcDateTime) -> String {
    let mut text = datetime.format(TIMESTAMP).unwrap_or_default();
    text.push_str("+00");
    text
}

const DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

const TIME: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second].[subsecond]");

const TIMESTAMP: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

#[cfg(test)]
mod test {
    use time::Month;

    use super::*;

    #[test]
    fn epoch() {
        let Value::Date(date) = decode_date(0) else { panic!() };
        assert_eq!(date, Date::from_calendar_date(2000, Month::January, 1).unwrap());

        let Value::Date(date) = decode_date(-1) else { panic!() };
        assert_eq!(date, Date::from_calendar_date(1999, Month::December, 31).unwrap());
        assert_eq!(encode_date(date), -1);
    }

    #[test]
    fn timestamp() {
        let datetime = PrimitiveDateTime::new(
            Date::from_calendar_date(2024, Month::March, 5).unwrap(),
            Time::from_hms_micro(13, 4, 5, 120).unwrap(),
        );
        let micros = encode_timestamp(datetime);
        let Value::Timestamp(decoded) = decode_timestamp(micros) else { panic!() };
        assert_eq!(decoded, datetime);
        assert_eq!(format_timestamp(datetime), "2024-03-05 13:04:05.00012");
    }

    #[test]
    fn time_of_day() {
        let time = Time::from_hms(1, 2, 3).unwrap();
        assert_eq!(encode_time(time), 3_723_000_000);
        assert!(decode_time(-1).is_err());
        assert_eq!(format_time(time), "01:02:03.0");
    }

    #[test]
    fn text_form() {
        let date = Date::from_calendar_date(987, Month::July, 9).unwrap();
        assert_eq!(format_date(date), "0987-07-09");

        let datetime = UtcDateTime::new(date, Time::from_hms_milli(23, 59, 1, 500).unwrap());
        assert_eq!(format_timestamptz(datetime), "0987-07-09 23:59:01.5+00");
    }
}
