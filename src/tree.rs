//! The compressed radix trie behind the router.
//!
//! Each node owns a path *segment run* rather than a single byte, so a
//! lookup costs O(path length) regardless of how many routes are
//! registered. One trie exists per `(method, subdomain)` pair; the router
//! builds them once at boot and only reads them afterwards.
//!
//! Insertion is **not** concurrency-safe — `increment_child_prio` reorders
//! the `indices`/`children` pair in place so the hottest branch is scanned
//! first. All inserts happen during `Router::build`, before serving.
//!
//! Path syntax: a segment starting with `:` captures up to the next `/`;
//! a segment starting with `*` captures the rest of the path (slashes
//! included) and must terminate it. One wildcard per segment, names must
//! be non-empty.

use crate::context::Params;
use crate::error::RouteError;
use crate::router::Chain;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum NodeKind {
    #[default]
    Static,
    Root,
    Param,
    CatchAll,
}

/// A single trie node.
#[derive(Default)]
pub(crate) struct Node {
    path: String,
    kind: NodeKind,
    /// True iff the sole child is a param/catch-all node. Such a node can
    /// never gain static siblings.
    wild_child: bool,
    /// First byte of each static child, parallel to `children`.
    indices: Vec<u8>,
    children: Vec<Node>,
    /// The handler chain of a complete registered path.
    chain: Option<Chain>,
    /// Access-frequency counter; children are kept sorted by it so the
    /// most-used branch is byte-scanned first.
    priority: u32,
    /// Upper bound of the parameter count under this subtree. Sizes the
    /// per-request parameter store.
    max_params: u8,
}

/// Counts `:`/`*` markers in a registered path, saturating at 255.
pub(crate) fn count_params(path: &str) -> u8 {
    path.bytes()
        .filter(|&b| b == b':' || b == b'*')
        .count()
        .min(255) as u8
}

/// Longest common prefix, backed off to a char boundary so slicing stays
/// valid for non-ASCII route paths.
fn common_prefix(a: &str, b: &str) -> usize {
    let mut i = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(i) {
        i -= 1;
    }
    i
}

impl Node {
    pub(crate) fn max_params(&self) -> u8 {
        self.max_params
    }

    /// Inserts `path` with its handler chain into the tree rooted at the
    /// receiver. Build-phase only.
    pub(crate) fn add_route(&mut self, path: &str, chain: Chain) -> Result<(), RouteError> {
        let full_path = path;
        let mut num_params = count_params(path);
        self.priority += 1;

        // empty tree
        if self.path.is_empty() && self.children.is_empty() {
            self.insert_child(num_params, path, full_path, chain)?;
            self.kind = NodeKind::Root;
            return Ok(());
        }

        let mut n = self;
        let mut path = path;

        'walk: loop {
            if num_params > n.max_params {
                n.max_params = num_params;
            }

            let i = common_prefix(path, &n.path);

            // split the edge: the unmatched suffix of this node becomes a
            // child carrying its children and handler
            if i < n.path.len() {
                let mut child = Node {
                    path: n.path[i..].to_owned(),
                    kind: NodeKind::Static,
                    wild_child: n.wild_child,
                    indices: std::mem::take(&mut n.indices),
                    children: std::mem::take(&mut n.children),
                    chain: n.chain.take(),
                    priority: n.priority - 1,
                    max_params: 0,
                };
                child.max_params = child
                    .children
                    .iter()
                    .map(|c| c.max_params)
                    .max()
                    .unwrap_or(0);

                n.indices = vec![n.path.as_bytes()[i]];
                n.children = vec![child];
                n.path.truncate(i);
                n.wild_child = false;
            }

            if i == path.len() {
                if n.chain.is_some() {
                    return Err(RouteError::DuplicatePath(full_path.to_owned()));
                }
                n.chain = Some(chain);
                return Ok(());
            }

            path = &path[i..];

            if n.wild_child {
                n = &mut n.children[0];
                n.priority += 1;
                if num_params > n.max_params {
                    n.max_params = num_params;
                }
                num_params -= 1;

                // the existing wildcard must match exactly, including a
                // longer-name check (":name" vs ":names")
                if path.len() >= n.path.len()
                    && n.path.as_bytes() == &path.as_bytes()[..n.path.len()]
                    && (n.path.len() >= path.len() || path.as_bytes()[n.path.len()] == b'/')
                {
                    continue 'walk;
                }

                let segment = path.split('/').next().unwrap_or(path).to_owned();
                let prefix = format!(
                    "{}{}",
                    &full_path[..full_path.find(&segment).unwrap_or(0)],
                    n.path
                );
                return Err(RouteError::WildcardConflict {
                    segment,
                    path: full_path.to_owned(),
                    existing: n.path.clone(),
                    prefix,
                });
            }

            let c = path.as_bytes()[0];

            // slash after a param node
            if n.kind == NodeKind::Param && c == b'/' && n.children.len() == 1 {
                n = &mut n.children[0];
                n.priority += 1;
                continue 'walk;
            }

            // descend into an existing static child
            if let Some(pos) = n.indices.iter().position(|&b| b == c) {
                let pos = n.increment_child_prio(pos);
                n = &mut n.children[pos];
                continue 'walk;
            }

            // otherwise grow a fresh static child for the remainder
            if c != b':' && c != b'*' {
                n.indices.push(c);
                n.children.push(Node {
                    max_params: num_params,
                    ..Node::default()
                });
                let pos = n.increment_child_prio(n.indices.len() - 1);
                n = &mut n.children[pos];
            }
            return n.insert_child(num_params, path, full_path, chain);
        }
    }

    /// Inserts the wildcard-bearing suffix `path`, creating dedicated
    /// param/catch-all nodes.
    fn insert_child(
        &mut self,
        mut num_params: u8,
        path: &str,
        full_path: &str,
        chain: Chain,
    ) -> Result<(), RouteError> {
        let bytes = path.as_bytes();
        let max = bytes.len();
        let mut n = self;
        let mut offset = 0;
        let mut i = 0;

        while i < max && num_params > 0 {
            let c = bytes[i];
            if c != b':' && c != b'*' {
                i += 1;
                continue;
            }

            // segment end; a second wildcard before it is malformed
            let mut end = i + 1;
            while end < max && bytes[end] != b'/' {
                match bytes[end] {
                    b':' | b'*' => {
                        return Err(RouteError::MultipleWildcards {
                            segment: path[i..].to_owned(),
                            path: full_path.to_owned(),
                        });
                    }
                    _ => end += 1,
                }
            }

            if !n.children.is_empty() {
                return Err(RouteError::WildcardConflictsChildren {
                    segment: path[i..end].to_owned(),
                    path: full_path.to_owned(),
                });
            }

            if end - i < 2 {
                return Err(RouteError::UnnamedWildcard(full_path.to_owned()));
            }

            if c == b':' {
                if i > 0 {
                    n.path = path[offset..i].to_owned();
                    offset = i;
                }

                n.children = vec![Node {
                    kind: NodeKind::Param,
                    max_params: num_params,
                    ..Node::default()
                }];
                n.wild_child = true;
                n = &mut n.children[0];
                n.priority += 1;
                num_params -= 1;

                // more path after the param: hang the rest below it
                if end < max {
                    n.path = path[offset..end].to_owned();
                    offset = end;
                    n.children = vec![Node {
                        max_params: num_params,
                        priority: 1,
                        ..Node::default()
                    }];
                    n = &mut n.children[0];
                }
            } else {
                // catch-all: must terminate the path
                if end != max || num_params > 1 {
                    return Err(RouteError::CatchAllNotLast(full_path.to_owned()));
                }
                if !n.path.is_empty() && n.path.ends_with('/') {
                    return Err(RouteError::CatchAllRootConflict(full_path.to_owned()));
                }
                if i == 0 || bytes[i - 1] != b'/' {
                    return Err(RouteError::CatchAllMissingSlash(full_path.to_owned()));
                }

                let slash = i - 1;
                n.path = path[offset..slash].to_owned();

                // two nodes: a placeholder owning the '/' dispatch, and the
                // value node carrying the handler
                n.children = vec![Node {
                    kind: NodeKind::CatchAll,
                    wild_child: true,
                    max_params: 1,
                    ..Node::default()
                }];
                n.indices = vec![b'/'];
                n = &mut n.children[0];
                n.priority += 1;

                n.children = vec![Node {
                    path: path[slash..].to_owned(),
                    kind: NodeKind::CatchAll,
                    max_params: 1,
                    chain: Some(chain),
                    priority: 1,
                    ..Node::default()
                }];
                return Ok(());
            }

            i += 1;
        }

        // no wildcard (left): plain suffix plus the handler
        n.path = path[offset..].to_owned();
        n.chain = Some(chain);
        Ok(())
    }

    /// Walks the trie with a request path. Returns the matched handler
    /// chain (if any) and whether adding/removing one trailing `/` would
    /// land on a registered path — the trailing-slash redirect
    /// recommendation. Captured parameters are pushed into `params`.
    pub(crate) fn get_value(&self, path: &str, params: &mut Params) -> (Option<Chain>, bool) {
        let mut n = self;
        let mut path = path;

        loop {
            if path.len() > n.path.len() {
                if path.as_bytes()[..n.path.len()] == *n.path.as_bytes() {
                    path = &path[n.path.len()..];

                    if !n.wild_child {
                        let c = path.as_bytes()[0];
                        if let Some(pos) = n.indices.iter().position(|&b| b == c) {
                            n = &n.children[pos];
                            continue;
                        }

                        // nothing deeper; "/a/b/" for a registered "/a/b"?
                        let tsr = path == "/" && n.chain.is_some();
                        return (None, tsr);
                    }

                    n = &n.children[0];
                    match n.kind {
                        NodeKind::Param => {
                            let end = path
                                .as_bytes()
                                .iter()
                                .position(|&b| b == b'/')
                                .unwrap_or(path.len());
                            params.push(&n.path[1..], &path[..end]);

                            if end < path.len() {
                                if !n.children.is_empty() {
                                    path = &path[end..];
                                    n = &n.children[0];
                                    continue;
                                }

                                let tsr = path.len() == end + 1;
                                return (None, tsr);
                            }

                            if let Some(chain) = &n.chain {
                                return (Some(chain.clone()), false);
                            }
                            if n.children.len() == 1 {
                                let child = &n.children[0];
                                let tsr = child.path == "/" && child.chain.is_some();
                                return (None, tsr);
                            }
                            return (None, false);
                        }
                        NodeKind::CatchAll => {
                            let value = path.strip_prefix('/').unwrap_or(path);
                            params.push(&n.path[2..], value);
                            return (n.chain.clone(), false);
                        }
                        // static/root under a wild_child parent cannot be
                        // built; reaching one is a build bug, not a request
                        // condition
                        NodeKind::Static | NodeKind::Root => {
                            unreachable!("invalid node kind below a wildcard parent")
                        }
                    }
                }
            } else if path == n.path {
                if let Some(chain) = &n.chain {
                    return (Some(chain.clone()), false);
                }

                if path == "/" && n.wild_child && n.kind != NodeKind::Root {
                    return (None, true);
                }

                // no handle here, but maybe one node further down the '/'
                // edge ("/a/b" requested, "/a/b/" registered)
                if let Some(pos) = n.indices.iter().position(|&b| b == b'/') {
                    let child = &n.children[pos];
                    let tsr = (child.path.len() == 1 && child.chain.is_some())
                        || (child.kind == NodeKind::CatchAll
                            && child.children[0].chain.is_some());
                    return (None, tsr);
                }

                return (None, false);
            }

            // dead end; recommend the one-slash fix when it would land
            let tsr = path == "/"
                || (n.path.len() == path.len() + 1
                    && n.path.as_bytes()[path.len()] == b'/'
                    && path.as_bytes() == &n.path.as_bytes()[..path.len()]
                    && n.chain.is_some());
            return (None, tsr);
        }
    }

    /// Bumps the priority of `children[pos]` and bubbles it ahead of any
    /// lower-priority left siblings. Returns its new position.
    fn increment_child_prio(&mut self, pos: usize) -> usize {
        self.children[pos].priority += 1;
        let priority = self.children[pos].priority;

        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < priority {
            self.children.swap(new_pos - 1, new_pos);
            self.indices.swap(new_pos - 1, new_pos);
            new_pos -= 1;
        }

        new_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Params;
    use crate::router::{handler, Chain};
    use std::sync::Arc;

    fn chain(tag: &'static str) -> Chain {
        Arc::new(vec![handler(move |ctx| ctx.write_string(tag))])
    }

    fn tag_of(chain: &Chain) -> String {
        use crate::request::Request;
        let ctx = crate::context::Context::new(Request::get("/"));
        for h in chain.iter() {
            h(&ctx);
        }
        String::from_utf8(ctx.take_response().body).unwrap()
    }

    fn lookup(tree: &Node, path: &str) -> (Option<String>, bool, Params) {
        let mut params = Params::with_capacity(8);
        let (chain, tsr) = tree.get_value(path, &mut params);
        (chain.map(|c| tag_of(&c)), tsr, params)
    }

    #[test]
    fn static_routes_no_cross_talk() {
        let mut tree = Node::default();
        for p in ["/", "/hello", "/help", "/contact", "/co", "/search/query"] {
            tree.add_route(p, chain(Box::leak(p.to_owned().into_boxed_str())))
                .unwrap();
        }

        for p in ["/hello", "/help", "/co", "/contact", "/search/query", "/"] {
            let (found, tsr, _) = lookup(&tree, p);
            assert_eq!(found.as_deref(), Some(p), "path {p}");
            assert!(!tsr);
        }

        let (found, _, _) = lookup(&tree, "/con");
        assert_eq!(found, None);
    }

    #[test]
    fn params_are_captured() {
        let mut tree = Node::default();
        tree.add_route("/users/:id", chain("one")).unwrap();
        tree.add_route("/users/:id/messages/:mid", chain("two")).unwrap();

        let (found, _, params) = lookup(&tree, "/users/42");
        assert_eq!(found.as_deref(), Some("one"));
        assert_eq!(params.get("id"), Some("42"));

        let (found, _, params) = lookup(&tree, "/users/42/messages/7");
        assert_eq!(found.as_deref(), Some("two"));
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("mid"), Some("7"));
    }

    #[test]
    fn catch_all_captures_remainder_without_leading_slash() {
        let mut tree = Node::default();
        tree.add_route("/files/*file", chain("files")).unwrap();

        let (found, _, params) = lookup(&tree, "/files/x/y/z");
        assert_eq!(found.as_deref(), Some("files"));
        assert_eq!(params.get("file"), Some("x/y/z"));
    }

    #[test]
    fn trailing_slash_recommendation() {
        let mut tree = Node::default();
        tree.add_route("/a/b/", chain("slash")).unwrap();

        let (found, tsr, _) = lookup(&tree, "/a/b");
        assert_eq!(found, None);
        assert!(tsr);

        let (found, tsr, _) = lookup(&tree, "/a/b/");
        assert_eq!(found.as_deref(), Some("slash"));
        assert!(!tsr);

        // and the other direction
        let mut tree = Node::default();
        tree.add_route("/x/y", chain("noslash")).unwrap();
        let (found, tsr, _) = lookup(&tree, "/x/y/");
        assert_eq!(found, None);
        assert!(tsr);
    }

    #[test]
    fn duplicate_path_is_an_error() {
        let mut tree = Node::default();
        tree.add_route("/users/:id", chain("a")).unwrap();
        assert_eq!(
            tree.add_route("/users/:id", chain("b")),
            Err(RouteError::DuplicatePath("/users/:id".to_owned()))
        );
    }

    #[test]
    fn wildcard_name_conflict_is_an_error() {
        let mut tree = Node::default();
        tree.add_route("/users/:id", chain("a")).unwrap();
        let err = tree.add_route("/users/:name", chain("b")).unwrap_err();
        assert!(matches!(err, RouteError::WildcardConflict { .. }), "{err}");
    }

    #[test]
    fn wildcard_conflicts_with_existing_children() {
        let mut tree = Node::default();
        tree.add_route("/src/static", chain("a")).unwrap();
        let err = tree.add_route("/src/:dir", chain("b")).unwrap_err();
        assert!(
            matches!(
                err,
                RouteError::WildcardConflictsChildren { .. } | RouteError::WildcardConflict { .. }
            ),
            "{err}"
        );
    }

    #[test]
    fn malformed_wildcards_are_errors() {
        let mut tree = Node::default();
        assert!(matches!(
            tree.add_route("/a/:b:c", chain("x")).unwrap_err(),
            RouteError::MultipleWildcards { .. }
        ));

        let mut tree = Node::default();
        assert!(matches!(
            tree.add_route("/a/:/b", chain("x")).unwrap_err(),
            RouteError::UnnamedWildcard(_)
        ));

        let mut tree = Node::default();
        assert!(matches!(
            tree.add_route("/a/*all/more", chain("x")).unwrap_err(),
            RouteError::CatchAllNotLast(_)
        ));

        let mut tree = Node::default();
        assert!(matches!(
            tree.add_route("/a/b*all", chain("x")).unwrap_err(),
            RouteError::CatchAllMissingSlash(_)
        ));
    }

    #[test]
    fn max_params_tracks_the_deepest_route() {
        let mut tree = Node::default();
        tree.add_route("/a/:b", chain("x")).unwrap();
        tree.add_route("/a/:b/:c/:d", chain("y")).unwrap();
        assert_eq!(tree.max_params(), 3);
    }

    #[test]
    fn priority_bubbles_hot_children_first() {
        let mut tree = Node::default();
        tree.add_route("/aaa", chain("a")).unwrap();
        tree.add_route("/bbb", chain("b")).unwrap();
        tree.add_route("/bcc", chain("c")).unwrap();
        tree.add_route("/bdd", chain("d")).unwrap();

        // the 'b' branch now carries three routes and must be scanned first
        assert_eq!(tree.indices[0], b'b');

        for (p, tag) in [("/aaa", "a"), ("/bbb", "b"), ("/bcc", "c"), ("/bdd", "d")] {
            let (found, _, _) = lookup(&tree, p);
            assert_eq!(found.as_deref(), Some(tag), "path {p}");
        }
    }

    #[test]
    fn param_and_static_same_level_split() {
        let mut tree = Node::default();
        tree.add_route("/cmd/:tool/:sub", chain("sub")).unwrap();
        tree.add_route("/cmd/:tool", chain("tool")).unwrap();

        let (found, _, params) = lookup(&tree, "/cmd/vet");
        assert_eq!(found.as_deref(), Some("tool"));
        assert_eq!(params.get("tool"), Some("vet"));

        let (found, _, params) = lookup(&tree, "/cmd/go/build");
        assert_eq!(found.as_deref(), Some("sub"));
        assert_eq!(params.get("tool"), Some("go"));
        assert_eq!(params.get("sub"), Some("build"));
    }
}
