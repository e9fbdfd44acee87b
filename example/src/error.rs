use pgexec::{Connection, ErrorKind, Result, State, StatementExecutor};

pub fn main() -> Result<()> {
    let mut conn = Connection::connect_env()?;
    let mut exe = StatementExecutor::new(&mut conn);

    // Preparation error

    let err = exe.prepare("SELEC 1").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Preparation(_)));
    assert_eq!(err.database_error().map(|e| e.code()), Some("42601"));
    assert_eq!(exe.state(), State::Inited);

    // Execution error, connection stays usable

    exe.prepare("SELECT 1 / $1::int4")?;
    exe.bind_params([0])?;
    let err = exe.execute().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Execution(_)));
    assert_eq!(exe.state(), State::Compiled);

    exe.bind_params([2])?;
    exe.execute()?;
    assert!(exe.fetch()?);
    assert_eq!(exe.get::<i32>(0)?, 0);

    // Caller errors

    assert!(matches!(exe.bind_params([1, 2]).unwrap_err().kind(), ErrorKind::Bind(_)));
    assert!(matches!(exe.get::<i32>(5).unwrap_err().kind(), ErrorKind::Index(_)));
    assert!(matches!(exe.get::<String>(0).unwrap_err().kind(), ErrorKind::TypeMismatch(_)));

    exe.reset();
    assert!(matches!(exe.fetch().unwrap_err().kind(), ErrorKind::State(_)));

    Ok(())
}
