use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

// FictionBook documents go through the HTML parser, so element names arrive
// lowercased and `<image>` is rewritten to `<img>`. Self-closed elements are
// left open, which is why only descendant combinators are used here.
selector!(FB2_ROOT_SELECTOR, "fictionbook");
selector!(FB2_TITLE_INFO_SELECTOR, "fictionbook description title-info");
selector!(FB2_BOOK_TITLE_SELECTOR, "book-title");
selector!(FB2_AUTHOR_SELECTOR, "author");
selector!(FB2_FIRST_NAME_SELECTOR, "first-name");
selector!(FB2_MIDDLE_NAME_SELECTOR, "middle-name");
selector!(FB2_LAST_NAME_SELECTOR, "last-name");
selector!(FB2_NICKNAME_SELECTOR, "nickname");
selector!(FB2_COVER_IMAGE_SELECTOR, "coverpage img, coverpage image");
selector!(FB2_BINARY_SELECTOR, "binary[id]");
