use std::cell::RefCell;
use pgexec::{Connection, Encode, Result, State, StatementExecutor};

pub fn main() -> Result<()> {
    let conn = RefCell::new(Connection::connect_env()?);

    conn.borrow_mut().simple_query("CREATE TEMP TABLE pgexec(id int4 PRIMARY KEY, name text)")?;

    // Insert, affected rows

    let mut insert = StatementExecutor::new(&conn);
    insert.prepare("INSERT INTO pgexec(id, name) VALUES($1, $2)")?;
    assert_eq!(insert.state(), State::Compiled);
    assert_eq!(insert.placeholder_count(), 2);

    for (id, name) in [(1, "Deez"), (2, "Foo"), (3, "Bar")] {
        insert.bind_params([id.encode(), name.encode()])?;
        insert.execute()?;
        assert_eq!(insert.affected_row_count()?, 1);
    }

    // Select by key

    let mut select = StatementExecutor::new(&conn);
    select.prepare("SELECT id, name FROM pgexec WHERE id = $1")?;
    select.bind_params([2])?;
    select.execute()?;

    assert_eq!(select.columns_returned(), 2);
    assert_eq!(select.meta_column(1)?.name(), "name");
    assert!(select.fetch()?);
    assert_eq!(select.get::<i32>(0)?, 2);
    assert_eq!(select.get::<String>(1)?, "Foo");
    assert!(!select.fetch()?);
    assert!(!select.fetch()?);

    // Re-execute with new parameters

    select.bind_params([3])?;
    select.execute()?;
    assert!(select.fetch()?);
    assert_eq!(select.get::<String>(1)?, "Bar");

    // Update, delete

    let mut update = StatementExecutor::new(&conn);
    update.prepare("UPDATE pgexec SET name = upper(name) WHERE id >= $1")?;
    update.bind_params([2])?;
    update.execute()?;
    assert_eq!(update.affected_row_count()?, 2);

    update.prepare("DELETE FROM pgexec")?;
    update.execute()?;
    assert_eq!(update.affected_row_count()?, 3);

    // Reset releases the statement

    update.reset();
    assert_eq!(update.state(), State::Inited);

    Ok(())
}
