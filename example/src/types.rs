use pgexec::{Connection, Encode, Json, Numeric, Result, SqlType, StatementExecutor};
use serde::{Deserialize, Serialize};
use time::{Date, Month, PrimitiveDateTime, Time};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Post {
    title: String,
    tags: Vec<String>,
}

pub fn main() -> Result<()> {
    let title = String::from("borrowed");
    let bytes = [0u8, 1, 255];
    let date = Date::from_calendar_date(2024, Month::March, 5).unwrap();
    let ts = PrimitiveDateTime::new(date, Time::from_hms(13, 4, 5).unwrap());
    let post = Post { title: "Deez".into(), tags: vec!["a".into(), "b".into()] };

    let mut conn = Connection::connect_env()?;
    let mut exe = StatementExecutor::new(&mut conn);

    exe.prepare(
        "SELECT $1::bool, $2::int8, $3::text, $4::bytea, $5::numeric, \
        $6::date, $7::timestamp, $8::jsonb, $9::int4",
    )?;
    exe.bind_params([
        true.encode(),
        i64::MAX.encode(),
        title.as_str().encode(),
        (&bytes[..]).encode(),
        Numeric("1234.5600").encode(),
        date.encode(),
        ts.encode(),
        Json(&post).encode(),
        None::<i32>.encode(),
    ])?;
    exe.execute()?;
    assert!(exe.fetch()?);

    assert!(exe.get::<bool>(0)?);
    assert_eq!(exe.get::<i64>(1)?, i64::MAX);
    assert_eq!(exe.get::<String>(2)?, title);
    assert_eq!(exe.get::<Vec<u8>>(3)?, bytes);
    assert_eq!(exe.get::<String>(4)?, "1234.5600");
    assert_eq!(exe.get::<Date>(5)?, date);
    assert_eq!(exe.get::<PrimitiveDateTime>(6)?, ts);
    assert_eq!(exe.get::<Json<Post>>(7)?.0, post);
    assert_eq!(exe.get::<Option<i32>>(8)?, None);

    assert_eq!(exe.meta_column(4)?.sql_type(), SqlType::Numeric);
    assert_eq!(exe.meta_column(7)?.sql_type(), SqlType::Json);

    // Untyped placeholder is described as text

    exe.prepare("SELECT $1")?;
    assert_eq!(exe.param_types(), [25]);
    exe.bind_params([42i32.encode()])?;
    exe.execute()?;
    assert!(exe.fetch()?);
    assert_eq!(exe.get::<String>(0)?, "42");

    Ok(())
}
