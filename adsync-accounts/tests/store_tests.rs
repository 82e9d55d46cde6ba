use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use adsync_accounts::command::render;
use adsync_accounts::{AccountBackend, AccountError, CommandRunner, LinuxAccountStore, RecordKind};
use adsync_core::{
    DaemonSettings, DirectoryConfig, LocalConfig, NewAccount, RemovalPolicy, SyncConfig,
    SystemFiles,
};
use tempfile::TempDir;

const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
                      daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
                      alice:x:1001:1500:Alice:/home/alice:/bin/bash\n";

const SHADOW: &str = "root:!:19000:0:99999:7:::\n\
                      daemon:*:19000:0:99999:7:::\n\
                      alice:$2b$12$oldhasholdhasholdhash:19100:0:99999:7:::\n\
                      zed:!!:19200::::::\n";

const GROUP: &str = "root:x:0:\n\
                     daemon:x:1:\n\
                     adsync:x:1500:\n";

/// Plays the part of the shadow-utils binaries by editing the fixture files.
struct FileSimulator {
    files: SystemFiles,
    log: Mutex<Vec<String>>,
}

impl FileSimulator {
    fn commands(&self) -> Vec<String> {
        self.log.lock().expect("lock").clone()
    }

    fn append(path: &Path, line: &str) {
        let mut contents = fs::read_to_string(path).expect("read");
        contents.push_str(line);
        contents.push('\n');
        fs::write(path, contents).expect("write");
    }

    fn drop_record(path: &Path, name: &str) {
        let contents = fs::read_to_string(path).expect("read");
        let kept: String = contents
            .split_inclusive('\n')
            .filter(|line| line.split(':').next() != Some(name))
            .collect();
        fs::write(path, kept).expect("write");
    }

    fn gid_of(&self, group: &str) -> String {
        fs::read_to_string(&self.files.group)
            .expect("read group")
            .lines()
            .map(|line| line.split(':').collect::<Vec<_>>())
            .find(|fields| fields[0] == group)
            .map(|fields| fields[2].to_string())
            .unwrap_or_else(|| "100".to_string())
    }
}

/// Handle given to the store; the test keeps the other `Arc`.
struct SimHandle(Arc<FileSimulator>);

impl CommandRunner for SimHandle {
    fn run(&self, program: &str, args: &[String]) -> Result<(), AccountError> {
        let sim = &self.0;
        sim.log.lock().expect("lock").push(render(program, args));
        let name = args.last().cloned().unwrap_or_default();
        let option = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        match program {
            "useradd" => {
                let gid = option("-g")
                    .map(|g| sim.gid_of(&g))
                    .unwrap_or_else(|| "100".to_string());
                let comment = option("-c").unwrap_or_default();
                FileSimulator::append(
                    &sim.files.passwd,
                    &format!("{name}:x:2000:{gid}:{comment}:/home/{name}:/bin/sh"),
                );
                FileSimulator::append(&sim.files.shadow, &format!("{name}:!:19000:0:99999:7:::"));
            }
            "userdel" => {
                FileSimulator::drop_record(&sim.files.passwd, &name);
                FileSimulator::drop_record(&sim.files.shadow, &name);
            }
            "groupadd" => FileSimulator::append(&sim.files.group, &format!("{name}:x:3000:")),
            "groupdel" => FileSimulator::drop_record(&sim.files.group, &name),
            other => panic!("unexpected program {other}"),
        }
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    files: SystemFiles,
    sim: Arc<FileSimulator>,
    store: LinuxAccountStore,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let path = |name: &str| -> PathBuf { dir.path().join(name) };
    let files = SystemFiles {
        passwd: path("passwd"),
        shadow: path("shadow"),
        group: path("group"),
    };
    fs::write(&files.passwd, PASSWD).expect("passwd");
    fs::write(&files.shadow, SHADOW).expect("shadow");
    fs::write(&files.group, GROUP).expect("group");

    let config = Arc::new(SyncConfig {
        directory: DirectoryConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            group_id: "group".into(),
            auth_url: "http://auth.invalid/token".into(),
            scope: "scope".into(),
            graph_url: "http://graph.invalid".into(),
            ignore_list: Vec::new(),
            timeout_secs: 30,
        },
        local: LocalConfig {
            files: files.clone(),
            user_options: [
                ("-g".to_string(), "adsync".to_string()),
                ("-c".to_string(), "$DISPLAY_NAME".to_string()),
            ]
            .into(),
            group_options: Default::default(),
            sync_group: "adsync".into(),
            default_password: "changeme".into(),
            removal_policy: RemovalPolicy::Difference,
            post_create_command: None,
        },
        daemon: DaemonSettings::default(),
        dry_run: false,
    });

    let sim = Arc::new(FileSimulator {
        files: files.clone(),
        log: Mutex::new(Vec::new()),
    });
    let mut store = LinuxAccountStore::with_runner(config, Box::new(SimHandle(sim.clone())));
    store.sync_accounts().expect("sync accounts");
    store.sync_groups().expect("sync groups");

    Fixture {
        _dir: dir,
        files,
        sim,
        store,
    }
}

fn bob() -> NewAccount {
    NewAccount {
        username: "bob@example.com".to_string(),
        display_name: "Bob Builder".to_string(),
    }
}

#[test]
fn secrets_rewrite_touches_only_the_target_hash() {
    let mut fx = fixture();

    fx.store.set_password("alice", "changeme").expect("set password");

    let after = fs::read_to_string(&fx.files.shadow).expect("shadow");
    let before_lines: Vec<&str> = SHADOW.split_inclusive('\n').collect();
    let after_lines: Vec<&str> = after.split_inclusive('\n').collect();
    assert_eq!(before_lines.len(), after_lines.len());

    for (i, (before, after)) in before_lines.iter().zip(&after_lines).enumerate() {
        if before.starts_with("alice:") {
            let old: Vec<&str> = before.split(':').collect();
            let new: Vec<&str> = after.split(':').collect();
            assert_eq!(old.len(), new.len());
            assert_ne!(old[1], new[1], "hash replaced");
            assert_eq!(old[2..], new[2..], "aging fields preserved");
        } else {
            assert_eq!(before, after, "line {i} must be byte-identical");
        }
    }
}

#[test]
fn set_password_with_marker_leaves_account_file_untouched() {
    let mut fx = fixture();
    let passwd_before = fs::read(&fx.files.passwd).expect("passwd");

    fx.store.set_password("alice", "changeme").expect("set password");

    assert_eq!(fs::read(&fx.files.passwd).expect("passwd"), passwd_before);
    assert_ne!(fs::read_to_string(&fx.files.shadow).expect("shadow"), SHADOW);
}

#[test]
fn set_password_for_unknown_account_is_not_found() {
    let mut fx = fixture();
    let err = fx.store.set_password("ghost", "changeme").unwrap_err();
    assert!(
        matches!(err, AccountError::NotFound { kind: RecordKind::Account, .. }),
        "got: {err}"
    );
    assert_eq!(fs::read_to_string(&fx.files.shadow).expect("shadow"), SHADOW);
}

#[test]
fn second_add_account_is_already_exists() {
    let mut fx = fixture();

    fx.store.add_account(&bob()).expect("first add");
    let count = fx.store.usernames().len();

    let err = fx.store.add_account(&bob()).unwrap_err();
    assert!(
        matches!(err, AccountError::AlreadyExists { kind: RecordKind::Account, .. }),
        "got: {err}"
    );
    assert_eq!(fx.store.usernames().len(), count);
    assert_eq!(
        fx.sim.commands(),
        vec!["useradd -c 'Bob Builder' -g adsync bob@example.com"]
    );
}

#[test]
fn new_account_joins_sync_group_through_primary_gid() {
    let mut fx = fixture();
    fx.store.add_account(&bob()).expect("add");

    let members = fx.store.usernames_in_group("adsync");
    assert_eq!(members, vec!["alice", "bob@example.com"]);
    assert_eq!(
        fx.store.get_account("bob@example.com").expect("bob").comment,
        "Bob Builder"
    );
}

#[test]
fn new_account_needs_password_until_one_is_set() {
    let mut fx = fixture();
    fx.store.add_account(&bob()).expect("add");

    let created = fx.store.get_account("bob@example.com").expect("bob");
    assert!(created.has_password);
    assert!(created.needs_password(), "useradd leaves a locked secret");

    fx.store
        .set_password("bob@example.com", "changeme")
        .expect("set password");

    let shadow = fs::read_to_string(&fx.files.shadow).expect("shadow");
    let bob_lines: Vec<&str> = shadow
        .lines()
        .filter(|line| line.starts_with("bob@example.com:"))
        .collect();
    assert_eq!(bob_lines.len(), 1, "locked line replaced, not duplicated");
    let hash = bob_lines[0].split(':').nth(1).expect("hash field");
    assert!(hash.starts_with(adsync_accounts::password::HASH_PREFIX));
    assert!(adsync_accounts::password::verify_password("changeme", hash));
    assert!(!fx
        .store
        .get_account("bob@example.com")
        .expect("bob")
        .needs_password());
}

#[test]
fn clashing_group_is_removed_before_useradd() {
    let mut fx = fixture();
    let mut group = fs::read_to_string(&fx.files.group).expect("group");
    group.push_str("bob@example.com:x:4000:\n");
    fs::write(&fx.files.group, group).expect("group");
    fx.store.sync_groups().expect("sync");

    fx.store.add_account(&bob()).expect("add");

    let commands = fx.sim.commands();
    assert_eq!(commands[0], "groupdel bob@example.com");
    assert!(commands[1].starts_with("useradd "));
    assert!(!fx.store.group_exists("bob@example.com"));
}

#[test]
fn remove_account_deletes_user_and_personal_group() {
    let mut fx = fixture();
    let mut group = fs::read_to_string(&fx.files.group).expect("group");
    group.push_str("alice:x:1001:\n");
    fs::write(&fx.files.group, group).expect("group");
    fx.store.sync_groups().expect("sync");

    fx.store.remove_account("alice").expect("remove");

    assert_eq!(fx.sim.commands(), vec!["userdel -r alice", "groupdel alice"]);
    assert!(!fx.store.account_exists("alice"));
    assert!(!fx.store.group_exists("alice"));
}

#[test]
fn add_group_creates_once() {
    let mut fx = fixture();

    fx.store.add_group("engineers").expect("add group");
    assert!(fx.store.group_exists("engineers"));

    let err = fx.store.add_group("engineers").unwrap_err();
    assert!(
        matches!(err, AccountError::AlreadyExists { kind: RecordKind::Group, .. }),
        "got: {err}"
    );
    assert_eq!(fx.sim.commands(), vec!["groupadd engineers"]);
}

#[test]
fn malformed_account_file_stops_sync() {
    let mut fx = fixture();
    fs::write(&fx.files.passwd, "root:x:0:0:root:/root:/bin/bash\nbroken:line\n")
        .expect("passwd");

    let err = fx.store.sync_accounts().unwrap_err();
    match err {
        AccountError::Parse { line, path, .. } => {
            assert_eq!(line, 2);
            assert_eq!(path, fx.files.passwd);
        }
        other => panic!("expected parse error, got: {other}"),
    }
}
