#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use data_cube::collection::{RecordTable, Records};
use data_cube::config::CsvConfig;
use tempfile::NamedTempFile;

pub const INSTRUMENTS: &str = "id,name\n1,trumpet\n2,piano\n3,sax\n";

pub const MUSICIANS: &str = "\
id,firstname,lastname,instrument
1,Miles,Davis,1
2,Freddie,Hubbard,1
3,Erroll,Garner,2
4,Bill,Evans,2
5,Thelonious,Monk,2
6,Bill,Evans,3
";

pub const SONGS: &str = "\
id,title,author,release_date
1,So What,1,1959-08-17
2,All Blues,1,1959-08-17
3,Blue In Green,4,1959-08-17
4,South Street Stroll,2,1969-01-21
5,Well You Needn't,5,1944-02-01
6,Blue Monk,5,1945-02-01
";

pub fn load_table(model: &str, csv: &str) -> RecordTable {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", csv).unwrap();

    let mut table = RecordTable::new(model);
    let summary = table.load_csv(tmp.path(), &CsvConfig::default()).unwrap();
    assert!(summary.errors.is_empty(), "fixture errors: {:?}", summary.errors);
    table
}

pub struct Fixture {
    pub instruments: Arc<RecordTable>,
    pub musicians: Arc<RecordTable>,
    pub songs: Arc<RecordTable>,
}

impl Fixture {
    pub fn new() -> Self {
        let instruments = Arc::new(load_table("instrument", INSTRUMENTS));
        let musicians = Arc::new(
            load_table("musician", MUSICIANS)
                .with_relation("instrument", instruments.clone())
                .unwrap()
                .with_label("lastname")
                .unwrap(),
        );
        let songs = Arc::new(
            load_table("song", SONGS)
                .with_relation("author", musicians.clone())
                .unwrap(),
        );
        Fixture {
            instruments,
            musicians,
            songs,
        }
    }

    pub fn musicians(&self) -> Records {
        self.musicians.records()
    }

    pub fn songs(&self) -> Records {
        self.songs.records()
    }
}
